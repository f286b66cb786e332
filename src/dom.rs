//! DOM Operations Adapter
//!
//! Thin helpers over the `dom_query` crate: defensive attribute reads,
//! node identity, inline-style editing and the visibility checks the
//! classifier, filter and badge renderer share.
//!
//! There is no layout engine here. "Rendered" means that neither the node
//! nor any ancestor carries `display: none` or `visibility: hidden` in its
//! inline style, which is exactly the state the filter pass writes.

// Re-export core types for external use
pub use dom_query::{Document, NodeId, NodeRef, Selection};

// Re-export StrTendril for external use
pub use tendril::StrTendril;

use crate::patterns::WHITESPACE_NORMALIZE;

// === Attribute Operations ===

/// Get any attribute value
#[inline]
#[must_use]
pub fn get_attribute(sel: &Selection, name: &str) -> Option<String> {
    sel.attr(name).map(|s| s.to_string())
}

/// Get an attribute value, empty when absent.
///
/// Classification reads attributes through this so malformed markup
/// degrades to "no label" instead of failing.
#[inline]
#[must_use]
pub fn attr_or_empty(sel: &Selection, name: &str) -> String {
    get_attribute(sel, name).unwrap_or_default()
}

// === Tag/Node Information ===

/// Get tag name (lowercase)
#[must_use]
pub fn tag_name(sel: &Selection) -> Option<String> {
    sel.nodes()
        .first()
        .and_then(dom_query::NodeRef::node_name)
        .map(|t| t.to_ascii_lowercase())
}

/// Identity of the first node in the selection.
#[inline]
#[must_use]
pub fn node_id(sel: &Selection) -> Option<NodeId> {
    sel.nodes().first().map(|node| node.id)
}

/// Re-materialise a selection from a stored node id.
///
/// Returns `None` when the id is unknown or the node was detached from the
/// document since it was captured.
#[must_use]
pub fn node_by_id(doc: &Document, id: NodeId) -> Option<Selection<'_>> {
    let node = doc.tree.get(&id)?;
    if !is_attached(doc, &node) {
        return None;
    }
    Some(Selection::from(node))
}

/// Whether the node's parent chain still reaches the document root.
#[must_use]
pub fn is_attached(doc: &Document, node: &NodeRef) -> bool {
    let root_id = doc.root().id;
    if node.id == root_id {
        return true;
    }

    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.id == root_id {
            return true;
        }
        current = parent.parent();
    }
    false
}

// === Text Content ===

/// Get all text content of node and descendants
#[inline]
#[must_use]
pub fn text_content(sel: &Selection) -> StrTendril {
    sel.text()
}

/// Lowercase a label and collapse whitespace runs to single spaces.
#[must_use]
pub fn normalize_label(raw: &str) -> String {
    WHITESPACE_NORMALIZE
        .replace_all(raw.trim(), " ")
        .to_lowercase()
}

// === Inline Style ===

/// Parse an inline `style` attribute into `(property, value)` pairs.
///
/// Properties are lowercased; values keep their text minus `!important`.
#[must_use]
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            if prop.is_empty() {
                return None;
            }
            let value = value.trim().trim_end_matches("!important").trim().to_string();
            Some((prop, value))
        })
        .collect()
}

fn write_style(sel: &Selection, decls: &[(String, String)]) {
    if decls.is_empty() {
        sel.remove_attr("style");
        return;
    }
    let style = decls
        .iter()
        .map(|(prop, value)| format!("{prop}: {value}"))
        .collect::<Vec<_>>()
        .join("; ");
    sel.set_attr("style", &style);
}

/// Value of one inline style property (lowercase), if declared.
#[must_use]
pub fn style_property(sel: &Selection, property: &str) -> Option<String> {
    let style = get_attribute(sel, "style")?;
    parse_style(&style)
        .into_iter()
        .rev()
        .find(|(prop, _)| prop == property)
        .map(|(_, value)| value.to_ascii_lowercase())
}

/// Set one inline style property, replacing earlier declarations of it.
pub fn set_style_property(sel: &Selection, property: &str, value: &str) {
    let mut decls = parse_style(&attr_or_empty(sel, "style"));
    decls.retain(|(prop, _)| prop != property);
    decls.push((property.to_string(), value.to_string()));
    write_style(sel, &decls);
}

/// Remove one inline style property. Returns true if something was removed.
pub fn remove_style_property(sel: &Selection, property: &str) -> bool {
    let Some(style) = get_attribute(sel, "style") else {
        return false;
    };
    let mut decls = parse_style(&style);
    let before = decls.len();
    decls.retain(|(prop, _)| prop != property);
    if decls.len() == before {
        return false;
    }
    write_style(sel, &decls);
    true
}

// === Visibility ===

/// Whether the node's own inline style hides it.
#[must_use]
pub fn is_hidden_inline(sel: &Selection) -> bool {
    style_property(sel, "display").is_some_and(|v| v == "none")
        || style_property(sel, "visibility").is_some_and(|v| v == "hidden")
}

/// Whether neither the node nor any ancestor hides it inline.
#[must_use]
pub fn is_rendered(sel: &Selection) -> bool {
    let Some(node) = sel.nodes().first() else {
        return false;
    };
    if is_hidden_inline(sel) {
        return false;
    }

    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.is_element() && is_hidden_inline(&Selection::from(parent)) {
            return false;
        }
        current = parent.parent();
    }
    true
}

/// Hide a node with `display: none`.
pub fn hide(sel: &Selection) {
    set_style_property(sel, "display", "none");
}

/// Remove hiding declarations from a node's inline style.
///
/// Nodes that are not hidden are left untouched. Returns true if the
/// node's style changed.
pub fn show(sel: &Selection) -> bool {
    let mut changed = false;
    if style_property(sel, "display").is_some_and(|v| v == "none") {
        changed |= remove_style_property(sel, "display");
    }
    if style_property(sel, "visibility").is_some_and(|v| v == "hidden") {
        changed |= remove_style_property(sel, "visibility");
    }
    changed
}

// === Tree Manipulation ===

/// Append HTML content
#[inline]
pub fn append_html(sel: &Selection, html: &str) {
    sel.append_html(html);
}

/// Escape text for use inside a double-quoted attribute or element body.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

// === Parsing ===

/// Parse HTML string into document
#[inline]
#[must_use]
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

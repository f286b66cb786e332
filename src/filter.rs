//! Filter pass over ad card candidates.
//!
//! Discovers card containers, classifies each, and toggles inline
//! visibility: target-bearing ad cards are shown, other ad-like cards are
//! hidden, see-more controls are forced visible and protected for the rest
//! of the pass.

use std::cell::Cell;
use std::collections::HashSet;

use dom_query::{Document, NodeId, Selection};
use log::{debug, info, warn};
use serde::Serialize;

use crate::classifier::{self, CardClass};
use crate::dom;
use crate::patterns::{
    AD_LIBRARY_LINK_SELECTOR, AD_PAGELET_SELECTOR, ARTICLE_SELECTOR, INTERACTIVE_SELECTOR,
    MAIN_REGION_SELECTOR,
};

/// How a filter pass ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PassStatus {
    /// The pass evaluated every candidate.
    #[default]
    Completed,
    /// Another pass was in progress; this call did nothing.
    AlreadyRunning,
    /// No candidates were found (page probably not loaded yet).
    NoCandidates,
}

/// Counts reported by one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    /// Cards shown because they carry the target action.
    pub shown: usize,
    /// Ad-like cards hidden because they do not.
    pub hidden: usize,
    /// See-more controls forced visible.
    pub protected: usize,
    pub status: PassStatus,
}

impl FilterOutcome {
    fn with_status(status: PassStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// Runs filter passes with a reentrancy guard.
///
/// A pass requested while one is running is dropped, not queued; the next
/// mutation or scroll trigger retries.
#[derive(Debug)]
pub struct FilterController {
    in_progress: Cell<bool>,
    min_ad_text_len: usize,
}

/// Clears the in-progress flag when a pass ends, however it ends.
pub(crate) struct PassGuard<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl FilterController {
    #[must_use]
    pub fn new(min_ad_text_len: usize) -> Self {
        Self {
            in_progress: Cell::new(false),
            min_ad_text_len,
        }
    }

    /// Whether a pass is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_progress.get()
    }

    pub(crate) fn begin_pass(&self) -> Option<PassGuard<'_>> {
        if self.in_progress.replace(true) {
            return None;
        }
        Some(PassGuard {
            flag: &self.in_progress,
        })
    }

    /// Run one filter pass over the document.
    pub fn run(&self, doc: &Document) -> FilterOutcome {
        let Some(_guard) = self.begin_pass() else {
            debug!("filter pass already running; dropping request");
            return FilterOutcome::with_status(PassStatus::AlreadyRunning);
        };

        let candidates = discover_candidates(doc, self.min_ad_text_len);
        if candidates.is_empty() {
            debug!("filter pass found no candidates");
            return FilterOutcome::with_status(PassStatus::NoCandidates);
        }

        // Classify everything first so protection holds for the whole pass,
        // whatever the candidate order.
        let classified: Vec<(Selection, CardClass)> = candidates
            .into_iter()
            .map(|card| {
                let class = classifier::classify_card(&card);
                (card, class)
            })
            .collect();

        let mut outcome = FilterOutcome::default();
        let mut protected: HashSet<NodeId> = HashSet::new();

        for (card, class) in &classified {
            if class.is_see_more_control {
                dom::show(card);
                if let Some(id) = dom::node_id(card) {
                    protected.insert(id);
                }
                outcome.protected += 1;
            }
        }

        for (card, class) in &classified {
            if class.is_see_more_control || within_protected(card, &protected) {
                continue;
            }
            if dom::is_hidden_inline(card) && !class.has_target_action {
                continue;
            }
            if !has_ad_content(card, self.min_ad_text_len) {
                continue;
            }

            if class.has_target_action {
                dom::show(card);
                outcome.shown += 1;
            } else {
                dom::hide(card);
                outcome.hidden += 1;
            }
        }

        info!(
            "filter pass: {} shown, {} hidden, {} protected",
            outcome.shown, outcome.hidden, outcome.protected
        );
        if outcome.shown == 0 && outcome.hidden > 0 {
            // Strict filtering: no rollback even if this blanks the page.
            warn!(
                "filter pass hid {} cards and showed none; keeping them hidden",
                outcome.hidden
            );
        }
        outcome
    }
}

impl Default for FilterController {
    fn default() -> Self {
        Self::new(100)
    }
}

fn within_protected(card: &Selection, protected: &HashSet<NodeId>) -> bool {
    let Some(node) = card.nodes().first() else {
        return false;
    };
    let mut current = node.parent();
    while let Some(parent) = current {
        if protected.contains(&parent.id) {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// Whether a card shows ad-like content: an image, an ads-library link,
/// or more than `min_text_len` characters of text.
#[must_use]
pub fn has_ad_content(card: &Selection, min_text_len: usize) -> bool {
    if card.select("img").exists() || card.select(AD_LIBRARY_LINK_SELECTOR).exists() {
        return true;
    }
    dom::text_content(card).trim().chars().count() > min_text_len
}

/// Find card candidates. The first non-empty discovery tier wins:
/// article role, ad-pagelet attributes, then innermost ad-like `div`s under
/// the main region. The whole document is never scanned as a fallback.
#[must_use]
pub fn discover_candidates(doc: &Document, min_ad_text_len: usize) -> Vec<Selection<'_>> {
    for selector in [ARTICLE_SELECTOR, AD_PAGELET_SELECTOR] {
        let found: Vec<Selection> = doc.select(selector).iter().collect();
        if !found.is_empty() {
            return found;
        }
    }

    let main = doc.select(MAIN_REGION_SELECTOR);
    let Some(region) = main.iter().next() else {
        return Vec::new();
    };
    innermost(region.select("div").iter().filter(|div| {
        div.select(INTERACTIVE_SELECTOR).exists() && has_ad_content(div, min_ad_text_len)
    }))
}

/// Keep only the elements that contain no other element of the set.
pub(crate) fn innermost<'a>(elements: impl Iterator<Item = Selection<'a>>) -> Vec<Selection<'a>> {
    let elements: Vec<Selection<'a>> = elements.collect();
    let mut has_inner: HashSet<NodeId> = HashSet::new();
    let members: HashSet<NodeId> = elements.iter().filter_map(dom::node_id).collect();

    for el in &elements {
        let Some(node) = el.nodes().first() else {
            continue;
        };
        let mut current = node.parent();
        while let Some(parent) = current {
            if members.contains(&parent.id) {
                has_inner.insert(parent.id);
            }
            current = parent.parent();
        }
    }

    elements
        .into_iter()
        .filter(|el| dom::node_id(el).is_some_and(|id| !has_inner.contains(&id)))
        .collect()
}

//! Ad card classification.
//!
//! Decides whether a subtree is a pagination ("see more") control or an ad
//! card carrying the target call-to-action. The see-more test always runs
//! first, both for the container and for every clickable element inside it:
//! load-more controls are picked up by the same container queries as ads,
//! and their links can contain target-like words.
//!
//! Everything here is pure: no DOM writes, no errors. Missing attributes
//! read as empty labels.

use dom_query::Selection;

use crate::dom;
use crate::patterns::{
    INTERACTIVE_SELECTOR, SEE_MORE_MAX_LABEL_CHARS, SEE_MORE_PHRASES, TARGET_ACTION_PHRASES,
};

/// Classification of one ad card candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardClass {
    /// The subtree is (or wraps) a pagination / load-more control.
    pub is_see_more_control: bool,
    /// The subtree contains a target call-to-action button.
    ///
    /// Always false when `is_see_more_control` is true.
    pub has_target_action: bool,
}

/// Classify a card candidate.
#[must_use]
pub fn classify_card(el: &Selection) -> CardClass {
    if is_see_more_control(el) {
        return CardClass {
            is_see_more_control: true,
            has_target_action: false,
        };
    }
    CardClass {
        is_see_more_control: false,
        has_target_action: contains_target_action(el),
    }
}

/// Whether the element itself, or any clickable descendant, is a see-more control.
///
/// Short-circuits on the element's own labels.
#[must_use]
pub fn is_see_more_control(el: &Selection) -> bool {
    if element_is_see_more(el) {
        return true;
    }
    el.select(INTERACTIVE_SELECTOR)
        .iter()
        .any(|control| element_is_see_more(&control))
}

/// Whether the element carries a target call-to-action and is not a see-more control.
#[must_use]
pub fn has_target_action(el: &Selection) -> bool {
    !is_see_more_control(el) && contains_target_action(el)
}

/// Whether a single element's own labels read as "see more".
///
/// Text must equal a phrase, or start with one and stay short; a long text
/// starting with "see more" is ad copy. `aria-label` and `title` only need
/// to contain a phrase.
#[must_use]
pub fn element_is_see_more(el: &Selection) -> bool {
    if el.nodes().is_empty() {
        return false;
    }

    let text = dom::normalize_label(&dom::text_content(el));
    if text_is_see_more(&text) {
        return true;
    }

    ["aria-label", "title"].iter().any(|name| {
        let label = dom::normalize_label(&dom::attr_or_empty(el, name));
        contains_any(&label, SEE_MORE_PHRASES)
    })
}

fn text_is_see_more(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    SEE_MORE_PHRASES.iter().any(|phrase| {
        text == *phrase
            || (text.starts_with(phrase) && text.chars().count() <= SEE_MORE_MAX_LABEL_CHARS)
    })
}

/// Combined text, aria-label and title of one element, normalised.
#[must_use]
pub fn combined_label(el: &Selection) -> String {
    let text = dom::text_content(el);
    let aria = dom::attr_or_empty(el, "aria-label");
    let title = dom::attr_or_empty(el, "title");
    dom::normalize_label(&format!("{text} {aria} {title}"))
}

fn contains_target_action(el: &Selection) -> bool {
    el.select(INTERACTIVE_SELECTOR).iter().any(|control| {
        if element_is_see_more(&control) {
            return false;
        }
        contains_any(&combined_label(&control), TARGET_ACTION_PHRASES)
    })
}

fn contains_any(label: &str, phrases: &[&str]) -> bool {
    !label.is_empty() && phrases.iter().any(|phrase| label.contains(phrase))
}

//! Result badges painted onto scanned cards.
//!
//! Each card carries at most one badge. The badge sits next to the card's
//! options ("...") button when one can be found, otherwise in the card's
//! top-right corner.

use dom_query::Selection;

use crate::classifier;
use crate::dom;
use crate::patterns::{INTERACTIVE_SELECTOR, MENU_BUTTON_PHRASES};

/// Attribute marking a badge element; its value is the tier.
pub const BADGE_ATTR: &str = "data-adscout-badge";

/// Visual tier of a badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeTier {
    /// At or above the high-count threshold: clickable, bucketed label.
    High { label: String },
    /// Below the threshold: plain label with the count, or `?` for zero.
    Low { label: String },
}

impl BadgeTier {
    /// Tier and label for a count.
    ///
    /// Buckets are the threshold, twice it and four times it (25+, 50+,
    /// 100+ with the default threshold).
    #[must_use]
    pub fn for_count(count: u64, threshold: u64) -> Self {
        if is_high_count(count, threshold) {
            let bucket = [threshold.saturating_mul(4), threshold.saturating_mul(2), threshold]
                .into_iter()
                .find(|bucket| count >= *bucket)
                .unwrap_or(threshold);
            Self::High {
                label: format!("{bucket}+"),
            }
        } else if count == 0 {
            Self::Low {
                label: "?".to_string(),
            }
        } else {
            Self::Low {
                label: count.to_string(),
            }
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::High { label } | Self::Low { label } => label,
        }
    }

    #[must_use]
    pub fn is_high(&self) -> bool {
        matches!(self, Self::High { .. })
    }
}

/// Whether `count` reaches the high tier. A zero threshold never does.
#[must_use]
pub fn is_high_count(count: u64, threshold: u64) -> bool {
    threshold > 0 && count >= threshold
}

/// What [`attach_badge`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeOutcome {
    Attached(BadgeTier),
    /// The card already had a badge; the first one stays.
    AlreadyPresent,
    /// The selection held no node.
    Detached,
}

/// Whether the card already carries a badge.
#[must_use]
pub fn has_badge(card: &Selection) -> bool {
    card.select(&format!("[{BADGE_ATTR}]")).exists()
}

/// Attach a result badge to a card, unless it already has one.
pub fn attach_badge(card: &Selection, count: u64, url: &str, threshold: u64) -> BadgeOutcome {
    if card.nodes().is_empty() {
        return BadgeOutcome::Detached;
    }
    if has_badge(card) {
        return BadgeOutcome::AlreadyPresent;
    }

    let position = dom::style_property(card, "position");
    if position.as_deref().is_none_or(|p| p == "static") {
        dom::set_style_property(card, "position", "relative");
    }

    let tier = BadgeTier::for_count(count, threshold);
    match find_menu_button(card) {
        Some(menu) if menu.parent().exists() => {
            dom::append_html(&menu.parent(), &badge_html(&tier, count, url, "margin-right: 8px"));
        }
        _ => {
            let corner = "position: absolute; top: 8px; right: 48px; z-index: 10";
            dom::append_html(card, &badge_html(&tier, count, url, corner));
        }
    }
    BadgeOutcome::Attached(tier)
}

fn badge_html(tier: &BadgeTier, count: u64, url: &str, placement: &str) -> String {
    let label = dom::escape_html(tier.label());
    match tier {
        BadgeTier::High { .. } => format!(
            r#"<a {BADGE_ATTR}="high" data-count="{count}" href="{}" target="_blank" rel="noopener noreferrer" title="{count} ads" style="{placement}; cursor: pointer">{label}</a>"#,
            dom::escape_html(url),
        ),
        BadgeTier::Low { .. } => format!(
            r#"<span {BADGE_ATTR}="low" data-count="{count}" style="{placement}">{label}</span>"#
        ),
    }
}

/// The card's options menu button: an aria-label naming a menu, or an
/// icon-only button. See-more controls never qualify.
#[must_use]
pub fn find_menu_button<'a>(card: &Selection<'a>) -> Option<Selection<'a>> {
    let controls: Vec<Selection<'a>> = card
        .select(INTERACTIVE_SELECTOR)
        .iter()
        .filter(|control| !classifier::element_is_see_more(control))
        .collect();

    let by_label = controls.iter().find(|control| {
        let aria = dom::normalize_label(&dom::attr_or_empty(control, "aria-label"));
        !aria.is_empty() && MENU_BUTTON_PHRASES.iter().any(|phrase| aria.contains(phrase))
    });
    if let Some(found) = by_label {
        return Some(found.clone());
    }

    controls
        .into_iter()
        .find(|control| {
            dom::tag_name(control).as_deref() != Some("a")
                && dom::text_content(control).trim().is_empty()
                && (control.select("svg").exists()
                    || control.select("i").exists()
                    || control.select("img").exists())
        })
}

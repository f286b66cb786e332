//! # adscout
//!
//! Page agent for an ads library listing: filters ad cards down to the ones
//! carrying a target call-to-action and checks each advertiser's ad volume.
//!
//! The agent works on a parsed document model of the host page. It never
//! counts ads itself; lookups go through a [`channel::BackgroundChannel`]
//! and the results are cached and painted onto the cards as badges.
//!
//! ## Quick Start
//!
//! ```rust
//! use adscout::{filter_html, Options};
//!
//! let html = r#"<html><body>
//! <div role="article"><img src="a.jpg"><button>Shop now</button></div>
//! <div role="article"><img src="b.jpg"><button>Learn more</button></div>
//! </body></html>"#;
//!
//! let (_doc, outcome) = filter_html(html, &Options::default());
//! assert_eq!(outcome.shown, 1);
//! assert_eq!(outcome.hidden, 1);
//! ```
//!
//! ## Features
//!
//! - **Filtering**: Shows target-bearing cards, hides other ad-like cards,
//!   never touches pagination ("see more") controls
//! - **Re-filtering**: Debounced passes on mutations and scrolling, with a
//!   cooldown after see-more clicks
//! - **Advertiser extraction**: Ranked profile-handle candidates per card
//! - **Sequential scan**: Rate-limited, pausable lookups with a TTL cache

mod error;
mod options;
mod patterns;

/// DOM helpers over `dom_query`: attributes, inline styles, visibility.
pub mod dom;

/// Card classification: see-more controls and target actions.
pub mod classifier;

/// Filter pass with candidate discovery and a reentrancy guard.
pub mod filter;

/// Debounced re-filter scheduling on a swappable clock.
pub mod scheduler;

/// Advertiser handle extraction and ranking.
pub mod advertiser;

/// Lookup scope read from the page URL.
pub mod scope;

/// URL utilities for resolution and ads library search links.
pub mod url_utils;

/// Lookup result cache with expiry.
pub mod cache;

/// Wire messages and popup commands.
pub mod protocol;

/// Message-passing boundary to the background process.
pub mod channel;

/// Result badges.
pub mod badge;

/// Sequential advertiser scan state machine.
pub mod scan;

/// Page agent tying filter, scheduler and scan together.
pub mod agent;

// Public API - re-exports
pub use agent::{PageAgent, PageEvent, PageHost, TickOutcome};
pub use error::{Error, Result};
pub use filter::{FilterController, FilterOutcome, PassStatus};
pub use options::{Options, PriorityWeights};
pub use scan::{ScanController, ScanPhase, ScanReport, ScanSnapshot};

/// Parses `html` and runs one filter pass over it.
///
/// Returns the document with card visibility applied, and the pass outcome.
#[must_use]
pub fn filter_html(html: &str, options: &Options) -> (dom_query::Document, FilterOutcome) {
    let doc = dom::parse(html);
    let outcome = FilterController::new(options.min_ad_text_len).run(&doc);
    (doc, outcome)
}

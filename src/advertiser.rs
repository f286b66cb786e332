//! Advertiser identity extraction.
//!
//! Harvests profile links from an ad card, turns each into a normalised
//! handle, and ranks the candidates with an additive heuristic score. The
//! score is a ranking signal only; no single factor makes a candidate
//! correct.

use std::collections::HashSet;

use dom_query::{NodeId, Selection};
use log::debug;
use url::Url;

use crate::dom;
use crate::options::{Options, PriorityWeights};
use crate::patterns::{
    EXCLUDED_PATHS, HANDLE_DENYLIST, MAX_HANDLE_CHARS, MIN_HANDLE_CHARS, REDIRECT_HOSTS,
    TEXT_PROFILE_LINK,
};
use crate::url_utils;
use crate::Result;

/// One plausible advertiser identity found in a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertiserCandidate {
    /// Normalised lowercase handle.
    pub username: String,
    /// Absolute profile URL on the host.
    pub profile_url: String,
    /// Back-reference to the owning card node.
    pub card: Option<NodeId>,
    /// Heuristic trust score; higher is better.
    pub priority_score: u32,
}

/// Host coordinates and weights the extractor needs.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Base URL relative hrefs are resolved against.
    pub base_url: Url,
    /// Domain a link's host must end with.
    pub domain: String,
    /// Ranking weights.
    pub weights: PriorityWeights,
}

impl ExtractorConfig {
    /// Build the extractor configuration from agent options.
    pub fn from_options(options: &Options) -> Result<Self> {
        Ok(Self {
            base_url: options.base_url()?,
            domain: options.host_domain.to_ascii_lowercase(),
            weights: options.weights,
        })
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        let base_url = Url::parse("https://www.facebook.com/").expect("static base URL");
        Self {
            base_url,
            domain: "facebook.com".to_string(),
            weights: PriorityWeights::default(),
        }
    }
}

/// Extract and rank advertiser candidates from a card.
///
/// Candidates are sorted by descending `priority_score`; ties keep
/// discovery order, so the first qualifying anchor wins. When no anchor
/// yields a valid handle, the card text is scanned once for a written-out
/// profile link.
#[must_use]
pub fn extract_advertisers(card: &Selection, config: &ExtractorConfig) -> Vec<AdvertiserCandidate> {
    let card_id = dom::node_id(card);
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for anchor in card.select("a[href]").iter() {
        let href = dom::attr_or_empty(&anchor, "href");
        let Some(handle) = handle_from_href(&href, config) else {
            continue;
        };
        if !seen.insert(handle.clone()) {
            continue;
        }

        let priority_score = score_anchor(&anchor, &handle, &config.weights);
        candidates.push(AdvertiserCandidate {
            profile_url: profile_url(&config.base_url, &handle),
            username: handle,
            card: card_id,
            priority_score,
        });
    }

    if candidates.is_empty() {
        if let Some(candidate) = text_fallback(card, card_id, config) {
            debug!("advertiser found by text fallback: {}", candidate.username);
            candidates.push(candidate);
        }
    }

    // Stable sort keeps discovery order among equal scores.
    candidates.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    candidates
}

/// Resolve an href and extract its handle if it points at a profile.
#[must_use]
pub fn handle_from_href(href: &str, config: &ExtractorConfig) -> Option<String> {
    let absolute = url_utils::create_absolute_url(href, &config.base_url);
    let (is_abs, parsed) = url_utils::is_absolute_url(&absolute);
    if !is_abs {
        return None;
    }
    handle_from_url(&parsed?, &config.domain)
}

/// Extract the handle (first path segment, lowercase) of a host profile URL.
///
/// Returns `None` for foreign hosts, redirectors, excluded paths and
/// handles that fail [`is_valid_handle`].
#[must_use]
pub fn handle_from_url(url: &Url, domain: &str) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    if host != domain && !host.ends_with(&format!(".{domain}")) {
        return None;
    }
    if REDIRECT_HOSTS.contains(&host.as_str()) {
        return None;
    }

    handle_from_path(&url.path().to_ascii_lowercase())
}

/// Handle of a lowercase host path, unless the path is excluded or the
/// first segment is not a valid handle.
fn handle_from_path(path: &str) -> Option<String> {
    if is_excluded_path(path) {
        return None;
    }
    let handle = path.trim_start_matches('/').split('/').next()?.to_string();
    is_valid_handle(&handle).then_some(handle)
}

fn is_excluded_path(path: &str) -> bool {
    // Segment-aware: "/help" excludes "/help/..." but not "/helpfulstore".
    EXCLUDED_PATHS.iter().any(|excluded| {
        let bare = excluded.trim_end_matches('/');
        path == bare || path.starts_with(&format!("{bare}/"))
    })
}

/// Whether a handle satisfies the advertiser handle invariant.
///
/// 3..=50 characters, not purely numeric, no leading or trailing `.`, and
/// not a platform path segment.
#[must_use]
pub fn is_valid_handle(handle: &str) -> bool {
    let len = handle.chars().count();
    if !(MIN_HANDLE_CHARS..=MAX_HANDLE_CHARS).contains(&len) {
        return false;
    }
    if handle.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if handle.starts_with('.') || handle.ends_with('.') {
        return false;
    }
    !HANDLE_DENYLIST.contains(&handle)
}

fn score_anchor(anchor: &Selection, handle: &str, weights: &PriorityWeights) -> u32 {
    let mut score = 0;

    let text = dom::text_content(anchor).to_lowercase();
    if text.contains(handle) {
        score += weights.text_contains_handle;
    }
    if dom::is_rendered(anchor) {
        score += weights.visible;
    }
    if (4..=20).contains(&handle.chars().count()) {
        score += weights.handle_length;
    }
    if !handle.contains('.') {
        score += weights.no_dot;
    }
    score
}

fn text_fallback(
    card: &Selection,
    card_id: Option<NodeId>,
    config: &ExtractorConfig,
) -> Option<AdvertiserCandidate> {
    let text = dom::text_content(card);
    let handle = TEXT_PROFILE_LINK.captures_iter(&text).find_map(|caps| {
        let segment = caps.get(1)?.as_str().trim_end_matches('.').to_lowercase();
        handle_from_path(&format!("/{segment}"))
    })?;

    Some(AdvertiserCandidate {
        profile_url: profile_url(&config.base_url, &handle),
        username: handle,
        card: card_id,
        priority_score: config.weights.text_fallback,
    })
}

fn profile_url(base: &Url, handle: &str) -> String {
    base.join(handle)
        .map_or_else(|_| format!("{base}{handle}"), |url| url.to_string())
}

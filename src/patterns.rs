//! Phrase sets, path lists, compiled regex patterns and CSS selectors.
//!
//! Phrases are stored lowercase and compared against normalised labels
//! (see [`crate::dom::normalize_label`]). Two languages are supported:
//! English and Brazilian Portuguese.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// Phrase Sets
// =============================================================================

/// Labels of pagination / load-more controls.
pub const SEE_MORE_PHRASES: &[&str] = &[
    "see more",
    "ver mais",
    "load more",
    "carregar mais",
    "show more",
    "mostrar mais",
    "see more results",
    "ver mais resultados",
];

/// Labels of the target call-to-action button.
pub const TARGET_ACTION_PHRASES: &[&str] = &["shop now", "comprar agora"];

/// aria-label fragments of a card's options ("...") menu button.
/// Checked only after see-more controls are excluded.
pub const MENU_BUTTON_PHRASES: &[&str] = &[
    "more",
    "mais",
    "options",
    "opções",
    "opcoes",
    "menu",
    "actions",
    "ações",
];

/// A label starting with a see-more phrase counts only up to this length.
/// Longer text is ad copy that happens to start with the phrase.
pub const SEE_MORE_MAX_LABEL_CHARS: usize = 40;

// =============================================================================
// Advertiser Handle Rules
// =============================================================================

/// Path prefixes that never lead to an advertiser profile.
pub const EXCLUDED_PATHS: &[&str] = &[
    "/l.php",
    "/login",
    "/help",
    "/policies",
    "/privacy",
    "/legal",
    "/terms",
    "/sharer",
    "/share",
    "/dialog",
    "/plugins",
    "/ads/",
    "/business",
    "/settings",
    "/watch",
    "/groups",
    "/events",
    "/hashtag",
    "/photo",
    "/story.php",
    "/permalink.php",
    "/profile.php",
    "/reel",
    "/marketplace",
    "/search",
    "/messages",
    "/notifications",
    "/gaming",
];

/// Hosts of outbound-link redirectors.
pub const REDIRECT_HOSTS: &[&str] = &["l.facebook.com", "lm.facebook.com"];

/// Platform and system path segments that are never advertiser handles.
pub const HANDLE_DENYLIST: &[&str] = &[
    "login",
    "login.php",
    "privacy",
    "l.php",
    "help",
    "policies",
    "policy",
    "sharer",
    "sharer.php",
    "share",
    "ads",
    "pages",
    "watch",
    "groups",
    "events",
    "hashtag",
    "photo",
    "photos",
    "legal",
    "terms",
    "settings",
    "business",
    "marketplace",
    "gaming",
    "dialog",
    "plugins",
    "profile.php",
    "home.php",
    "permalink.php",
    "story.php",
    "search",
    "reel",
    "reels",
    "stories",
    "notifications",
    "messages",
    "recover",
    "checkpoint",
];

/// Shortest accepted handle (characters).
pub const MIN_HANDLE_CHARS: usize = 3;

/// Longest accepted handle (characters).
pub const MAX_HANDLE_CHARS: usize = 50;

/// Matches a host profile link written out in a card's text.
pub static TEXT_PROFILE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.|m\.)?facebook\.com/([a-z0-9][a-z0-9._-]{1,49})")
        .expect("TEXT_PROFILE_LINK regex")
});

/// Matches runs of whitespace for label normalisation.
pub static WHITESPACE_NORMALIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_NORMALIZE regex"));

// =============================================================================
// CSS Selectors
// =============================================================================

/// Elements a user can click: buttons, anchors and ARIA buttons.
pub const INTERACTIVE_SELECTOR: &str = r#"button, a, [role="button"]"#;

/// First discovery tier: article-like semantic role.
pub const ARTICLE_SELECTOR: &str = r#"[role="article"]"#;

/// Second discovery tier: attributes the ads library puts on card pagelets.
pub const AD_PAGELET_SELECTOR: &str = concat!(
    r#"[data-pagelet^="AdCard"], [data-pagelet*="ad_card"], "#,
    r#"[data-testid="ad-card"], [data-testid*="ad_card"], [data-ad-id]"#
);

/// Main content region scoping the last-resort discovery tier.
pub const MAIN_REGION_SELECTOR: &str = r#"[role="main"], main"#;

/// Links into the ads library itself.
pub const AD_LIBRARY_LINK_SELECTOR: &str =
    r#"a[href*="facebook.com/ads"], a[href^="/ads/library"]"#;

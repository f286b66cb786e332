//! Configuration options for the page agent.
//!
//! The `Options` struct carries the host coordinates, the heuristic
//! thresholds and the timing policy of the filter scheduler and the scan.
//! Every field has a default, and a partial JSON document can be loaded
//! over those defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Additive weights used to rank advertiser candidates.
///
/// These are empirical tuning constants, not invariants. Higher total score
/// means a more trustworthy candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    /// The anchor's visible text contains the handle.
    ///
    /// Default: `10`
    pub text_contains_handle: u32,

    /// The anchor is rendered (no hiding inline style on it or its ancestors).
    ///
    /// Default: `5`
    pub visible: u32,

    /// Handle length is within 4..=20 characters.
    ///
    /// Default: `3`
    pub handle_length: u32,

    /// Handle contains no `.`.
    ///
    /// Default: `2`
    pub no_dot: u32,

    /// Fixed score of the synthetic candidate found by the text fallback.
    ///
    /// Default: `1`
    pub text_fallback: u32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            text_contains_handle: 10,
            visible: 5,
            handle_length: 3,
            no_dot: 2,
            text_fallback: 1,
        }
    }
}

/// Configuration options for the page agent.
///
/// All fields are public for easy configuration. Use `Default::default()`
/// for standard settings.
///
/// # Example
///
/// ```rust
/// use adscout::Options;
///
/// let options = Options {
///     default_country: "US".to_string(),
///     check_delay_ms: 2_000,
///     ..Options::default()
/// };
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Base URL relative anchors are resolved against.
    ///
    /// Default: `https://www.facebook.com/`
    pub host_base_url: String,

    /// Domain an anchor's host must end with to be an advertiser link.
    ///
    /// Default: `facebook.com`
    pub host_domain: String,

    /// Ads-library search path used to build result URLs.
    ///
    /// Default: `https://www.facebook.com/ads/library/`
    pub ads_library_url: String,

    /// Country used when the page URL carries no `country` parameter.
    ///
    /// Default: `BR`
    pub default_country: String,

    /// Ad counts at or above this value are "high". Must be positive.
    ///
    /// Default: `25`
    pub high_count_threshold: u64,

    /// Pause between two scanned cards (rate limit), milliseconds.
    ///
    /// Default: `1000`
    pub check_delay_ms: u64,

    /// Window after a see-more click during which re-filtering waits, milliseconds.
    ///
    /// Default: `3000`
    pub see_more_cooldown_ms: u64,

    /// Debounce delay for mutation-triggered re-filtering, milliseconds.
    ///
    /// Default: `500`
    pub mutation_delay_ms: u64,

    /// Debounce delay for scroll-triggered re-filtering, milliseconds.
    ///
    /// Default: `300`
    pub scroll_delay_ms: u64,

    /// Scroll debounce delay right after a see-more click, milliseconds.
    ///
    /// Default: `1500`
    pub scroll_delay_after_see_more_ms: u64,

    /// Gap between two see-more clicks of a manual filter, milliseconds.
    ///
    /// Default: `500`
    pub manual_click_stagger_ms: u64,

    /// Lifetime of a cached lookup result, seconds.
    ///
    /// Default: `3600`
    pub cache_ttl_secs: u64,

    /// Trimmed text longer than this marks a candidate as ad-like.
    ///
    /// Default: `100`
    pub min_ad_text_len: usize,

    /// Start a fresh scan after scroll-triggered re-filtering.
    ///
    /// Default: `false`
    pub auto_check_on_scroll: bool,

    /// Advertiser ranking weights.
    pub weights: PriorityWeights,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host_base_url: "https://www.facebook.com/".to_string(),
            host_domain: "facebook.com".to_string(),
            ads_library_url: "https://www.facebook.com/ads/library/".to_string(),
            default_country: "BR".to_string(),
            high_count_threshold: 25,
            check_delay_ms: 1_000,
            see_more_cooldown_ms: 3_000,
            mutation_delay_ms: 500,
            scroll_delay_ms: 300,
            scroll_delay_after_see_more_ms: 1_500,
            manual_click_stagger_ms: 500,
            cache_ttl_secs: 3_600,
            min_ad_text_len: 100,
            auto_check_on_scroll: false,
            weights: PriorityWeights::default(),
        }
    }
}

impl Options {
    /// Parse options from a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Check that URLs parse and that no policy value is degenerate.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.host_base_url)?;
        Url::parse(&self.ads_library_url)?;

        if self.host_domain.trim().is_empty() {
            return Err(Error::ConfigError("host_domain is empty".to_string()));
        }
        if self.default_country.trim().is_empty() {
            return Err(Error::ConfigError("default_country is empty".to_string()));
        }
        if self.cache_ttl_secs == 0 {
            return Err(Error::ConfigError("cache_ttl_secs must be positive".to_string()));
        }
        if self.high_count_threshold == 0 {
            return Err(Error::ConfigError(
                "high_count_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed `host_base_url`.
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.host_base_url)?)
    }

    #[must_use]
    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    #[must_use]
    pub fn manual_click_stagger(&self) -> Duration {
        Duration::from_millis(self.manual_click_stagger_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();

        assert_eq!(opts.host_domain, "facebook.com");
        assert_eq!(opts.default_country, "BR");
        assert_eq!(opts.high_count_threshold, 25);
        assert_eq!(opts.cache_ttl_secs, 3_600);
        assert_eq!(opts.min_ad_text_len, 100);
        assert!(!opts.auto_check_on_scroll);
        assert_eq!(opts.weights.text_contains_handle, 10);
        assert_eq!(opts.weights.visible, 5);
        assert_eq!(opts.weights.handle_length, 3);
        assert_eq!(opts.weights.no_dot, 2);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let opts = Options::from_json(r#"{"default_country": "US", "weights": {"visible": 7}}"#)
            .expect("valid options");

        assert_eq!(opts.default_country, "US");
        assert_eq!(opts.weights.visible, 7);
        assert_eq!(opts.weights.text_contains_handle, 10);
        assert_eq!(opts.check_delay(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let opts = Options {
            host_base_url: "not a url".to_string(),
            ..Options::default()
        };
        assert!(matches!(opts.validate(), Err(Error::UrlError(_))));

        let opts = Options {
            cache_ttl_secs: 0,
            ..Options::default()
        };
        assert!(matches!(opts.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_zero_high_count_threshold_is_rejected() {
        let opts = Options {
            high_count_threshold: 0,
            ..Options::default()
        };
        assert!(matches!(opts.validate(), Err(Error::ConfigError(_))));
        assert!(Options::from_json(r#"{"high_count_threshold": 0}"#).is_err());

        let opts = Options {
            high_count_threshold: u64::MAX,
            ..Options::default()
        };
        assert!(opts.validate().is_ok());
    }
}

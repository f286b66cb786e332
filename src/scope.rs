//! Lookup scope taken from the host page's filters.
//!
//! A lookup counts an advertiser's ads for the same country and start-date
//! window the user applied on the host page, so the scope is read from the
//! page URL's query string.

use serde::{Deserialize, Serialize};
use url::Url;

/// Start-date window of a lookup. Bounds are `YYYY-MM-DD` strings as the
/// host page writes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Country and date window a lookup is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupScope {
    pub country: String,
    pub date_range: DateRange,
}

impl LookupScope {
    /// Read `country`, `start_date[min]` and `start_date[max]` from a page URL.
    ///
    /// Empty parameters count as absent.
    #[must_use]
    pub fn from_page_url(page_url: &Url, default_country: &str) -> Self {
        let mut country = None;
        let mut start = None;
        let mut end = None;

        for (key, value) in page_url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "country" => country = Some(value.to_ascii_uppercase()),
                "start_date[min]" => start = Some(value.to_string()),
                "start_date[max]" => end = Some(value.to_string()),
                _ => {}
            }
        }

        Self {
            country: country.unwrap_or_else(|| default_country.to_string()),
            date_range: DateRange { start, end },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_page_url() {
        let url = Url::parse(
            "https://www.facebook.com/ads/library/?country=us&start_date[min]=2024-01-01&start_date[max]=2024-02-01&q=x",
        )
        .expect("url");
        let scope = LookupScope::from_page_url(&url, "BR");

        assert_eq!(scope.country, "US");
        assert_eq!(scope.date_range.start.as_deref(), Some("2024-01-01"));
        assert_eq!(scope.date_range.end.as_deref(), Some("2024-02-01"));
    }

    #[test]
    fn test_scope_defaults() {
        let url = Url::parse("https://www.facebook.com/ads/library/?country=&q=x").expect("url");
        let scope = LookupScope::from_page_url(&url, "BR");

        assert_eq!(scope.country, "BR");
        assert_eq!(scope.date_range, DateRange::default());
    }

    #[test]
    fn test_scope_percent_encoded_brackets() {
        let url = Url::parse(
            "https://www.facebook.com/ads/library/?start_date%5Bmin%5D=2024-03-05",
        )
        .expect("url");
        let scope = LookupScope::from_page_url(&url, "BR");
        assert_eq!(scope.date_range.start.as_deref(), Some("2024-03-05"));
    }
}

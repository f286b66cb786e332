//! URL Utility Functions
//!
//! Resolution of anchor hrefs against the host, and construction of the
//! ads-library search URL a badge opens.

use chrono::NaiveDate;
use url::Url;

use crate::scope::LookupScope;
use crate::Result;

/// Check if a string is a valid absolute http(s) URL.
///
/// # Returns
/// * `(is_absolute, parsed_url)` - Whether URL is absolute and the parsed URL if valid
#[must_use]
pub fn is_absolute_url(s: &str) -> (bool, Option<Url>) {
    let s = s.trim();

    if !s.starts_with("http://") && !s.starts_with("https://") {
        return (false, None);
    }

    match Url::parse(s) {
        Ok(url) if url.host().is_some() => (true, Some(url)),
        _ => (false, None),
    }
}

/// Convert a relative or absolute href to absolute form.
///
/// Non-navigational schemes (`javascript:`, `mailto:`, ...) and empty
/// strings come back unchanged so callers can reject them.
#[must_use]
pub fn create_absolute_url(href: &str, base: &Url) -> String {
    let href = href.trim();

    if href.is_empty() {
        return String::new();
    }

    if href.starts_with("data:")
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return href.to_string();
    }

    let (is_abs, _) = is_absolute_url(href);
    if is_abs {
        return href.to_string();
    }

    match base.join(href) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Unix epoch seconds of a `YYYY-MM-DD` date at UTC midnight.
#[must_use]
pub fn date_to_epoch_secs(date: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

/// Build the ads-library search URL for an advertiser within a lookup scope.
///
/// Date bounds are appended as epoch seconds when they parse.
pub fn ads_library_url(library_base: &str, advertiser: &str, scope: &LookupScope) -> Result<String> {
    let mut url = Url::parse(library_base)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("active_status", "active")
            .append_pair("ad_type", "all")
            .append_pair("country", &scope.country)
            .append_pair("media_type", "all")
            .append_pair("search_type", "keyword_unordered")
            .append_pair("q", advertiser);

        if let Some(min) = scope.date_range.start.as_deref().and_then(date_to_epoch_secs) {
            query.append_pair("start_date[min]", &min.to_string());
        }
        if let Some(max) = scope.date_range.end.as_deref().and_then(date_to_epoch_secs) {
            query.append_pair("start_date[max]", &max.to_string());
        }
    }
    Ok(url.to_string())
}

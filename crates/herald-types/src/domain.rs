//! Domain and timestamp helpers.

use chrono::{DateTime, SecondsFormat, Utc};

/// Extracts the lowercase host of an absolute URL, without port.
///
/// Returns `None` for relative URLs and URLs without a host.
pub fn domain_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

/// Normalizes a user- or network-supplied domain for comparison.
///
/// Trims whitespace, lowercases, strips an `http://`/`https://` scheme and any
/// trailing slashes. `"https://Alice.com/"` becomes `"alice.com"`.
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_ascii_lowercase()
}

/// Formats a timestamp the way Herald persists it (`2026-01-02T03:04:05Z`).
///
/// Fixed-width and zero-padded, so stored timestamps order correctly under
/// plain string comparison.
pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The current time in persisted form.
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Parses an RFC 3339 timestamp into persisted form, or formats `fallback`
/// when `raw` does not parse.
///
/// Persisted timestamps are compared as strings, so a free-form value like
/// `"Mar 3 2026"` must never be stored.
pub fn normalize_timestamp(raw: &str, fallback: DateTime<Utc>) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(parsed) => to_rfc3339(parsed.with_timezone(&Utc)),
        Err(_) => to_rfc3339(fallback),
    }
}

/// The oldest persisted timestamp a `max_age_days` retention window keeps
/// at `now`.
///
/// `None` when the window reaches past the representable calendar, in which
/// case nothing is old enough to drop.
pub fn retention_cutoff(max_age_days: u32, now: DateTime<Utc>) -> Option<String> {
    chrono::TimeDelta::try_days(i64::from(max_age_days))
        .and_then(|window| now.checked_sub_signed(window))
        .map(to_rfc3339)
}

/// Returns `true` if a view last refreshed at `last_refresh` should be
/// refreshed again at `now`.
///
/// A view that never refreshed, or whose timestamp cannot be parsed, is
/// stale.
pub fn is_stale(last_refresh: Option<&str>, staleness_minutes: u64, now: DateTime<Utc>) -> bool {
    let Some(last) = last_refresh.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()) else {
        return true;
    };
    let window = i64::try_from(staleness_minutes)
        .ok()
        .and_then(chrono::TimeDelta::try_minutes)
        .unwrap_or(chrono::TimeDelta::MAX);
    now.signed_duration_since(last.with_timezone(&Utc)) > window
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn retention_cutoff_saturates_on_huge_windows() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            retention_cutoff(30, now).as_deref(),
            Some("2026-02-08T12:00:00Z")
        );
        assert_eq!(retention_cutoff(0, now).as_deref(), Some("2026-03-10T12:00:00Z"));
        assert_eq!(retention_cutoff(u32::MAX, now), None);
        assert_eq!(retention_cutoff(200_000_000, now), None);
    }

    #[test]
    fn normalize_timestamp_falls_back_on_free_form_input() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            normalize_timestamp("2026-03-01T09:00:00+02:00", now),
            "2026-03-01T07:00:00Z"
        );
        assert_eq!(normalize_timestamp("Mar 3 2026", now), "2026-03-10T12:00:00Z");
        assert_eq!(normalize_timestamp("", now), "2026-03-10T12:00:00Z");
    }

    #[test]
    fn domain_from_absolute_url() {
        assert_eq!(
            domain_from_url("https://Bob.com:8443/posts/hello.md"),
            Some("bob.com".to_string())
        );
        assert_eq!(domain_from_url("/posts/hello.md"), None);
        assert_eq!(domain_from_url(""), None);
    }

    #[test]
    fn normalize_strips_scheme_and_case() {
        assert_eq!(normalize_domain(" https://Alice.com/ "), "alice.com");
        assert_eq!(normalize_domain("http://carol.net"), "carol.net");
        assert_eq!(normalize_domain("dave.org"), "dave.org");
    }

    #[test]
    fn staleness_window() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        assert!(is_stale(None, 15, now));
        assert!(is_stale(Some("garbage"), 15, now));
        assert!(!is_stale(Some("2026-01-02T11:50:00Z"), 15, now));
        assert!(!is_stale(Some("2026-01-02T11:45:00Z"), 15, now));
        assert!(is_stale(Some("2026-01-02T11:44:59Z"), 15, now));
    }

    #[test]
    fn rfc3339_is_fixed_width() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(to_rfc3339(at), "2026-01-02T03:04:05Z");
    }
}

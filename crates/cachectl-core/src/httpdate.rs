//! HTTP date formatting and parsing.
//!
//! Dates are written in IMF-fixdate, the preferred form of RFC 9110 §5.6.7.
//! Parsing also accepts the obsolete RFC 850 and asctime forms, and falls
//! back to RFC 2822 for senders that include a numeric offset.

use chrono::{DateTime, NaiveDateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %d %H:%M:%S %Y";

/// Format a timestamp as IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(IMF_FIXDATE).to_string()
}

/// Parse an HTTP date in any of the accepted forms.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, IMF_FIXDATE) {
        return Some(dt.and_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, RFC_850) {
        return Some(dt.and_utc());
    }

    // asctime pads single-digit days with a space
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&collapsed, ASCTIME) {
        return Some(dt.and_utc());
    }

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

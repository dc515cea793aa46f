//! Timestamp parsing and the textual forms the pipeline writes.
//!
//! Source timestamps arrive as loosely formatted ISO-8601 strings. Everything
//! is parsed into a zone-less [`NaiveDateTime`] (offsets are normalised to
//! UTC) and re-rendered in one of two fixed layouts, both of which sort
//! lexicographically in chronological order.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Layout of normalized timestamp columns (microsecond precision).
pub const CANONICAL_TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Layout of persisted watermarks (millisecond precision), as accepted by
/// the dataset API's filter expressions.
pub const WATERMARK_FMT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Zone-less layouts tried in order. `%.f` accepts an absent fraction.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601-ish timestamp.
///
/// Returns `None` for blank or unrecognised input; callers decide whether
/// that is an error.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ndt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Render a timestamp in the normalized column layout.
#[must_use]
pub fn format_canonical(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_TIMESTAMP_FMT).to_string()
}

/// Render a timestamp in the watermark layout.
#[must_use]
pub fn format_watermark(ts: &NaiveDateTime) -> String {
    ts.format(WATERMARK_FMT).to_string()
}

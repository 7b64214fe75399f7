//! Watermark values and timestamp conversions.
//!
//! In memory every timestamp is epoch milliseconds (UTC). Strings only
//! appear at the edges: ISO-8601 in the watermark document, source-native
//! strings on the way in, and warehouse literals on the way out.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Literal format accepted by the warehouse for timestamp columns.
pub const WAREHOUSE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Naive formats accepted from sources, interpreted as UTC.
const NAIVE_SOURCE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized timestamp '{0}'")]
pub struct TimestampError(pub String);

/// Last successfully advanced point of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(i64);

impl Watermark {
    #[must_use]
    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(now_millis())
    }

    #[must_use]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Render as `YYYY-MM-DDTHH:MM:SS.sssZ`.
    #[must_use]
    pub fn to_iso(self) -> String {
        format_iso(self.0)
    }

    /// Parse the at-rest representation written by [`Watermark::to_iso`].
    ///
    /// Any timestamp shape accepted from sources is accepted here too, so a
    /// hand-edited document with a date-only or epoch value still loads.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] if the string is not a recognizable timestamp.
    pub fn parse_iso(raw: &str) -> Result<Self, TimestampError> {
        parse_timestamp(raw).map(Self)
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso())
    }
}

/// Current UTC time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Format epoch milliseconds as RFC 3339 with millisecond precision.
#[must_use]
pub fn format_iso(ms: i64) -> String {
    to_datetime(ms).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format epoch milliseconds as a warehouse literal
/// (`YYYY-MM-DD HH:MM:SS.mmm`, UTC, no zone suffix).
#[must_use]
pub fn format_warehouse(ms: i64) -> String {
    to_datetime(ms).format(WAREHOUSE_DATETIME_FMT).to_string()
}

/// Convert epoch milliseconds to a naive UTC datetime truncated to millis.
#[must_use]
pub fn to_naive_utc(ms: i64) -> NaiveDateTime {
    to_datetime(ms).naive_utc()
}

/// Convert a naive UTC datetime back to epoch milliseconds.
#[must_use]
pub fn from_naive_utc(value: NaiveDateTime) -> i64 {
    value.and_utc().timestamp_millis()
}

/// Parse a source-native timestamp string into epoch milliseconds.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.fff]` (UTC), a bare
/// `YYYY-MM-DD` date and integral epoch milliseconds.
///
/// # Errors
///
/// Returns [`TimestampError`] when none of the accepted shapes match.
pub fn parse_timestamp(raw: &str) -> Result<i64, TimestampError> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse::<i64>()
            .map_err(|_| TimestampError(raw.to_string()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }
    for fmt in NAIVE_SOURCE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(from_naive_utc(naive));
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(from_naive_utc(naive));
        }
    }
    Err(TimestampError(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn iso_roundtrip_keeps_millis() {
        let wm = Watermark::from_millis(1_717_171_717_123);
        assert_eq!(wm.to_iso(), "2024-05-31T16:08:37.123Z");
        assert_eq!(Watermark::parse_iso(&wm.to_iso()).unwrap(), wm);
    }

    #[test]
    fn warehouse_literal_is_space_separated_millis() {
        assert_eq!(format_warehouse(1_717_171_717_123), "2024-05-31 16:08:37.123");
        assert_eq!(format_warehouse(0), "1970-01-01 00:00:00.000");
    }

    #[rstest]
    #[case("2024-05-31T16:08:37.123Z", 1_717_171_717_123)]
    #[case("2024-05-31T18:08:37.123+02:00", 1_717_171_717_123)]
    #[case("2024-05-31 16:08:37.123", 1_717_171_717_123)]
    #[case("2024-05-31 16:08:37", 1_717_171_717_000)]
    #[case("2024-05-31T16:08:37.123456", 1_717_171_717_123)]
    #[case("1717171717123", 1_717_171_717_123)]
    #[case("2024-05-31", 1_717_113_600_000)]
    fn parses_source_shapes(#[case] raw: &str, #[case] expected: i64) {
        assert_eq!(parse_timestamp(raw).unwrap(), expected);
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn naive_conversion_truncates_to_millis() {
        let naive = to_naive_utc(1_717_171_717_123);
        assert_eq!(from_naive_utc(naive), 1_717_171_717_123);
    }
}

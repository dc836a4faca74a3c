//! RFC 3339 timestamps at the storage boundary.
//!
//! Dates cross the storage boundary as plain strings; callers re-hydrate them
//! with `parse_timestamp` at the point of use.

use chrono::{DateTime, SecondsFormat, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stored timestamp that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampError {
    pub value: String,
}

impl Display for TimestampError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid RFC 3339 timestamp: `{}`", self.value)
    }
}

impl Error for TimestampError {}

/// Formats `at` the way records store it (UTC, millisecond precision).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in stored form.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Converts Unix epoch milliseconds; `None` when out of range.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Parses a stored timestamp, normalizing any offset to UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| TimestampError {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, from_epoch_millis, parse_timestamp};
    use chrono::{TimeZone, Utc};

    #[test]
    fn format_then_parse_preserves_instant() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let stored = format_timestamp(at);
        assert_eq!(stored, "2024-03-01T08:30:00.000Z");
        assert_eq!(parse_timestamp(&stored).unwrap(), at);
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let parsed = parse_timestamp("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn epoch_millis_convert_to_utc() {
        let at = from_epoch_millis(1_709_281_800_000).unwrap();
        assert_eq!(format_timestamp(at), "2024-03-01T08:30:00.000Z");
        assert!(from_epoch_millis(i64::MAX).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.value, "yesterday");
    }
}

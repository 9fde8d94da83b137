//! Timestamp utilities.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Instant;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as RFC 3339 with second precision and a `Z` suffix.
#[must_use]
pub fn rfc3339(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Returns the current Unix time in whole seconds.
#[must_use]
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Milliseconds elapsed since `start`, saturating at `u64::MAX`.
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc3339_second_precision() {
        let ts = Utc.with_ymd_and_hms(2023, 10, 5, 14, 30, 0).unwrap();
        assert_eq!(rfc3339(&ts), "2023-10-05T14:30:00Z");
    }

    #[test]
    fn test_unix_seconds_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(unix_seconds() > 1_577_836_800);
    }

    #[test]
    fn test_elapsed_ms_monotonic() {
        let start = Instant::now();
        assert!(elapsed_ms(start) < 10_000);
    }
}

// Clock - Logical update timestamps
//
// Every mutation stamps the record with `advance(previous)` so that the
// stored `updated_at` never moves backwards, even when the wall clock does.

use chrono::{DateTime, Duration, Utc};

/// Timestamp used for last-write-wins comparison
pub type Timestamp = DateTime<Utc>;

/// Current wall-clock time
pub fn now() -> Timestamp {
    Utc::now()
}

/// Next timestamp for a record last stamped at `previous`.
///
/// Returns the wall clock if it is ahead of `previous`, otherwise
/// `previous` plus one microsecond.
pub fn advance(previous: Timestamp) -> Timestamp {
    let current = now();
    if current > previous {
        current
    } else {
        previous + Duration::microseconds(1)
    }
}

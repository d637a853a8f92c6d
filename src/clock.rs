//! Wall-clock time for window calculations.

use chrono::Utc;

/// Current time as milliseconds since the Unix epoch.
///
/// Window math runs on epoch milliseconds so that every process sharing the
/// counter store agrees on window boundaries.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

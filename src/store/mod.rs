//! Shared window-counter storage.
//!
//! The engine delegates all counting to a [`CounterStore`]: atomic, expiring
//! counters shared by every limiter process. Correctness under concurrent
//! access comes from the store's transactional primitives, never from
//! in-process locks, because the processes sharing a limit do not share
//! memory.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Result of recording one permit against a sliding log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingCount {
    /// Log length after the append, counting only entries inside the window.
    pub count: u64,
    /// Timestamp of the oldest entry still inside the window, epoch millis.
    pub oldest_ms: Option<i64>,
}

/// Atomic, expiring counters shared across limiter processes.
///
/// Each mutating operation must be a single atomic round-trip against the
/// store. A read-then-write sequence from the client would undercount when
/// several processes hit the same key at once.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for the window starting at `window_start_ms`,
    /// creating it with an expiry of `window` if absent, and return the
    /// post-increment count.
    async fn increment_fixed(
        &self,
        key: &str,
        window_start_ms: i64,
        window: Duration,
    ) -> Result<u64>;

    /// Append an entry at `now_ms` to the key's log, drop entries that have
    /// aged out of the trailing `window`, and return the resulting length
    /// together with the oldest surviving entry.
    async fn record_sliding(&self, key: &str, now_ms: i64, window: Duration)
        -> Result<SlidingCount>;

    /// Read the fixed-window count without consuming a permit.
    async fn peek_fixed(&self, key: &str, window_start_ms: i64) -> Result<u64>;

    /// Count log entries inside the trailing window without mutating the log.
    async fn peek_sliding(&self, key: &str, now_ms: i64, window: Duration) -> Result<u64>;
}

//! In-memory counter store.
//!
//! Backs single-process deployments and deterministic tests. Per-key
//! atomicity comes from the concurrent map's entry locks, mirroring the
//! serialization the Redis scripts provide across processes.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CounterStore, SlidingCount};
use crate::error::Result;

/// One counter per key, reset whenever a new window begins.
#[derive(Debug, Clone, Copy)]
struct FixedSlot {
    window_start_ms: i64,
    count: u64,
}

/// In-memory [`CounterStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    fixed: DashMap<String, FixedSlot>,
    /// Sliding logs, entries in append order. Assumes time does not run
    /// backwards within a key.
    sliding: DashMap<String, Vec<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment_fixed(
        &self,
        key: &str,
        window_start_ms: i64,
        _window: Duration,
    ) -> Result<u64> {
        let mut slot = self.fixed.entry(key.to_string()).or_insert(FixedSlot {
            window_start_ms,
            count: 0,
        });

        if slot.window_start_ms != window_start_ms {
            slot.window_start_ms = window_start_ms;
            slot.count = 0;
        }
        slot.count += 1;

        Ok(slot.count)
    }

    async fn record_sliding(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
    ) -> Result<SlidingCount> {
        let cutoff = now_ms - window.as_millis() as i64;
        let mut log = self.sliding.entry(key.to_string()).or_default();

        log.retain(|&ts| ts > cutoff);
        log.push(now_ms);

        Ok(SlidingCount {
            count: log.len() as u64,
            oldest_ms: log.first().copied(),
        })
    }

    async fn peek_fixed(&self, key: &str, window_start_ms: i64) -> Result<u64> {
        let count = self
            .fixed
            .get(key)
            .filter(|slot| slot.window_start_ms == window_start_ms)
            .map(|slot| slot.count)
            .unwrap_or(0);
        Ok(count)
    }

    async fn peek_sliding(&self, key: &str, now_ms: i64, window: Duration) -> Result<u64> {
        let cutoff = now_ms - window.as_millis() as i64;
        let count = self
            .sliding
            .get(key)
            .map(|log| log.iter().filter(|&&ts| ts > cutoff).count() as u64)
            .unwrap_or(0);
        Ok(count)
    }
}

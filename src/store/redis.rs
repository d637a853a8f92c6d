//! Redis-backed counter store.
//!
//! Counters are updated by server-side Lua scripts so that each operation is
//! one atomic round-trip. The trim, append, and count of a sliding log (and
//! the increment-plus-expiry of a fixed counter) never decompose into
//! separate client calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tracing::info;
use uuid::Uuid;

use super::{CounterStore, SlidingCount};
use crate::error::{FloodgateError, Result};

/// Increment a fixed-window counter, arming its expiry when the window is
/// first touched.
const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Trim aged entries from a sliding log, append the new one, and return the
/// log length plus the oldest surviving timestamp (-1 when the log is empty).
const SLIDING_WINDOW_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', now - window)
redis.call('ZADD', KEYS[1], now, ARGV[3])
redis.call('PEXPIRE', KEYS[1], window)
local count = redis.call('ZCARD', KEYS[1])
local oldest = redis.call('ZRANGE', KEYS[1], 0, 0, 'WITHSCORES')
local oldest_ms = -1
if oldest[2] then
  oldest_ms = tonumber(oldest[2])
end
return {count, oldest_ms}
"#;

/// Redis-backed [`CounterStore`] shared by every limiter process.
///
/// Holds one long-lived multiplexed connection, cloned per call. Every
/// round-trip is bounded by the configured operation timeout; an exceeded
/// timeout is reported as store unavailability, never as an indefinite hang.
pub struct RedisStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    fixed_script: Script,
    sliding_script: Script,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to the store at `url`, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| FloodgateError::Config(format!("Invalid store URL: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| FloodgateError::StoreUnavailable(e.to_string()))?;

        info!(url = url, timeout_ms = op_timeout.as_millis() as u64, "Connected to counter store");

        Ok(Self {
            conn,
            op_timeout,
            fixed_script: Script::new(FIXED_WINDOW_SCRIPT),
            sliding_script: Script::new(SLIDING_WINDOW_SCRIPT),
        })
    }

    /// Run a store round-trip under the configured timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = redis::RedisResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(FloodgateError::from),
            Err(_) => Err(FloodgateError::StoreUnavailable(format!(
                "Operation timed out after {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }

    /// Key for the counter of one fixed window.
    fn bucket_key(key: &str, window_start_ms: i64) -> String {
        format!("{}:{}", key, window_start_ms)
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment_fixed(
        &self,
        key: &str,
        window_start_ms: i64,
        window: Duration,
    ) -> Result<u64> {
        let mut conn = self.conn.clone();
        let bucket = Self::bucket_key(key, window_start_ms);

        let count: u64 = self
            .bounded(
                self.fixed_script
                    .key(&bucket)
                    .arg(window.as_millis() as u64)
                    .invoke_async(&mut conn),
            )
            .await?;

        Ok(count)
    }

    async fn record_sliding(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
    ) -> Result<SlidingCount> {
        let mut conn = self.conn.clone();
        // Permits recorded in the same millisecond need distinct members.
        let member = format!("{}:{}", now_ms, Uuid::new_v4());

        let (count, oldest_ms): (u64, i64) = self
            .bounded(
                self.sliding_script
                    .key(key)
                    .arg(now_ms)
                    .arg(window.as_millis() as u64)
                    .arg(member)
                    .invoke_async(&mut conn),
            )
            .await?;

        Ok(SlidingCount {
            count,
            oldest_ms: (oldest_ms >= 0).then_some(oldest_ms),
        })
    }

    async fn peek_fixed(&self, key: &str, window_start_ms: i64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let bucket = Self::bucket_key(key, window_start_ms);

        let count: Option<u64> = self
            .bounded(redis::cmd("GET").arg(&bucket).query_async(&mut conn))
            .await?;

        Ok(count.unwrap_or(0))
    }

    async fn peek_sliding(&self, key: &str, now_ms: i64, window: Duration) -> Result<u64> {
        let mut conn = self.conn.clone();
        let cutoff = now_ms - window.as_millis() as i64;

        let count: u64 = self
            .bounded(
                redis::cmd("ZCOUNT")
                    .arg(key)
                    .arg(format!("({}", cutoff))
                    .arg("+inf")
                    .query_async(&mut conn),
            )
            .await?;

        Ok(count)
    }
}

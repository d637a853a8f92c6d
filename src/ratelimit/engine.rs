//! Core admission engine.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use super::decision::Decision;
use super::key::CounterKey;
use super::policy::{Algorithm, Policy};
use crate::clock;
use crate::error::Result;
use crate::store::CounterStore;

/// Non-consuming usage snapshot for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// Permits consumed in the current window.
    pub used: u64,
    /// Permits left before the policy denies.
    pub remaining: u64,
}

/// Admits or denies requests for one policy against the shared counter
/// store.
///
/// The engine is stateless per call: every decision is a round-trip to the
/// store, whose transactional updates serialize concurrent increments from
/// all processes. Counts are never cached locally.
pub struct RateLimiter {
    policy: Policy,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a limiter for one policy over a shared store handle.
    pub fn new(policy: Policy, store: Arc<dyn CounterStore>) -> Self {
        Self { policy, store }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Decide whether the request for `partition` may proceed, consuming one
    /// permit if it may.
    ///
    /// This suspends on a store round-trip. Store failures surface as
    /// [`StoreUnavailable`](crate::error::FloodgateError::StoreUnavailable),
    /// never as a denial.
    pub async fn admit(&self, partition: &str) -> Result<Decision> {
        self.admit_at(partition, clock::now_ms()).await
    }

    /// [`admit`](Self::admit) with an explicit timestamp.
    ///
    /// Useful for replaying traffic and for tests that step time without
    /// sleeping.
    pub async fn admit_at(&self, partition: &str, now_ms: i64) -> Result<Decision> {
        let key = CounterKey::new(self.policy.name(), partition);

        trace!(
            key = %key,
            algorithm = ?self.policy.algorithm(),
            "Checking rate limit"
        );

        let decision = match self.policy.algorithm() {
            Algorithm::FixedWindow => self.admit_fixed(&key, now_ms).await?,
            Algorithm::SlidingWindow => self.admit_sliding(&key, now_ms).await?,
        };

        if let Decision::Denied { retry_after } = decision {
            debug!(
                key = %key,
                limit = self.policy.permit_limit(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    async fn admit_fixed(&self, key: &CounterKey, now_ms: i64) -> Result<Decision> {
        let window_ms = self.policy.window_ms();
        let window_start = now_ms - now_ms.rem_euclid(window_ms);

        let count = self
            .store
            .increment_fixed(&key.to_string(), window_start, self.policy.window())
            .await?;

        // Time until the aligned window rolls over.
        let until_reset = Duration::from_millis((window_start + window_ms - now_ms) as u64);
        let limit = u64::from(self.policy.permit_limit());

        if count <= limit {
            Ok(Decision::Allowed {
                remaining: limit - count,
                reset_after: until_reset,
            })
        } else {
            Ok(Decision::Denied {
                retry_after: until_reset,
            })
        }
    }

    async fn admit_sliding(&self, key: &CounterKey, now_ms: i64) -> Result<Decision> {
        let recorded = self
            .store
            .record_sliding(&key.to_string(), now_ms, self.policy.window())
            .await?;

        // Time until the oldest logged entry leaves the trailing window.
        let until_capacity = recorded
            .oldest_ms
            .map(|oldest| (oldest + self.policy.window_ms() - now_ms).max(0) as u64)
            .unwrap_or(0);
        let until_capacity = Duration::from_millis(until_capacity);
        let limit = u64::from(self.policy.permit_limit());

        if recorded.count <= limit {
            Ok(Decision::Allowed {
                remaining: limit - recorded.count,
                reset_after: until_capacity,
            })
        } else {
            Ok(Decision::Denied {
                retry_after: until_capacity,
            })
        }
    }

    /// Report current usage for `partition` without consuming a permit.
    pub async fn probe(&self, partition: &str) -> Result<Usage> {
        self.probe_at(partition, clock::now_ms()).await
    }

    /// [`probe`](Self::probe) with an explicit timestamp.
    pub async fn probe_at(&self, partition: &str, now_ms: i64) -> Result<Usage> {
        let key = CounterKey::new(self.policy.name(), partition);

        let used = match self.policy.algorithm() {
            Algorithm::FixedWindow => {
                let window_ms = self.policy.window_ms();
                let window_start = now_ms - now_ms.rem_euclid(window_ms);
                self.store.peek_fixed(&key.to_string(), window_start).await?
            }
            Algorithm::SlidingWindow => {
                self.store
                    .peek_sliding(&key.to_string(), now_ms, self.policy.window())
                    .await?
            }
        };

        Ok(Usage {
            used,
            remaining: u64::from(self.policy.permit_limit()).saturating_sub(used),
        })
    }
}

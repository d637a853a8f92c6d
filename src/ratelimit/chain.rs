//! Conjunctive evaluation of multiple policies.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::decision::Decision;
use super::engine::RateLimiter;
use super::policy::Policy;
use crate::clock;
use crate::config::{FailureMode, FloodgateConfig};
use crate::error::{FloodgateError, Result};
use crate::store::CounterStore;

/// Partition key used by the global policy.
pub const GLOBAL_PARTITION: &str = "global";

/// How a policy derives its partition key from the caller's identity.
#[derive(Debug, Clone)]
pub enum Partitioner {
    /// Every identity gets its own counter.
    PerIdentity,
    /// All identities share one counter under a fixed partition.
    Constant(String),
}

impl Partitioner {
    fn resolve<'a>(&'a self, identity: &'a str) -> &'a str {
        match self {
            Partitioner::PerIdentity => identity,
            Partitioner::Constant(partition) => partition,
        }
    }
}

/// An ordered set of policies combined with logical AND.
///
/// A request is admitted only when every policy admits it. Evaluation is
/// sequential and stops at the first denial, so later policies are not
/// charged for requests an earlier one rejected. Store unavailability is
/// resolved here according to the configured [`FailureMode`]: fail-open
/// admits the affected stage with a warning, fail-closed returns the error
/// to the caller (which an HTTP boundary maps to 503, distinct from 429).
pub struct PolicyChain {
    stages: Vec<(Partitioner, RateLimiter)>,
    failure_mode: FailureMode,
}

impl PolicyChain {
    /// Create an empty chain. An empty chain admits everything.
    pub fn new(failure_mode: FailureMode) -> Self {
        Self {
            stages: Vec::new(),
            failure_mode,
        }
    }

    /// Build the configured chain over one shared store handle: the global
    /// policy first, then the per-identity policy.
    pub fn from_config(config: &FloodgateConfig, store: Arc<dyn CounterStore>) -> Result<Self> {
        let global = Policy::from_config("global", &config.limits.global)?;
        let identity = Policy::from_config("identity", &config.limits.identity)?;

        let mut chain = Self::new(config.store.failure_mode);
        chain.push(
            Partitioner::Constant(GLOBAL_PARTITION.to_string()),
            RateLimiter::new(global, Arc::clone(&store)),
        );
        chain.push(Partitioner::PerIdentity, RateLimiter::new(identity, store));
        Ok(chain)
    }

    /// Append a policy evaluated with the given partitioning scheme.
    pub fn push(&mut self, partitioner: Partitioner, limiter: RateLimiter) {
        self.stages.push((partitioner, limiter));
    }

    /// Number of policies in the chain.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no policies.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Decide whether the request from `identity` may proceed, consuming one
    /// permit from every policy it clears.
    pub async fn admit(&self, identity: &str) -> Result<Decision> {
        self.admit_at(identity, clock::now_ms()).await
    }

    /// [`admit`](Self::admit) with an explicit timestamp.
    pub async fn admit_at(&self, identity: &str, now_ms: i64) -> Result<Decision> {
        // Most restrictive metadata across the stages that answered.
        let mut tightest: Option<(u64, Duration)> = None;

        for (partitioner, limiter) in &self.stages {
            let partition = partitioner.resolve(identity);

            match limiter.admit_at(partition, now_ms).await {
                Ok(Decision::Allowed {
                    remaining,
                    reset_after,
                }) => {
                    tightest = Some(match tightest {
                        Some((r, ra)) => (r.min(remaining), ra.max(reset_after)),
                        None => (remaining, reset_after),
                    });
                }
                Ok(denied @ Decision::Denied { .. }) => return Ok(denied),
                Err(FloodgateError::StoreUnavailable(reason)) => match self.failure_mode {
                    FailureMode::Open => {
                        warn!(
                            policy = limiter.policy().name(),
                            partition = partition,
                            reason = %reason,
                            "Counter store unavailable, admitting (fail-open)"
                        );
                    }
                    FailureMode::Closed => {
                        warn!(
                            policy = limiter.policy().name(),
                            partition = partition,
                            reason = %reason,
                            "Counter store unavailable, refusing (fail-closed)"
                        );
                        return Err(FloodgateError::StoreUnavailable(reason));
                    }
                },
                Err(other) => return Err(other),
            }
        }

        match tightest {
            Some((remaining, reset_after)) => Ok(Decision::Allowed {
                remaining,
                reset_after,
            }),
            // Every stage failed open, or the chain is empty: admit with no
            // usage information.
            None => Ok(Decision::Allowed {
                remaining: 0,
                reset_after: Duration::ZERO,
            }),
        }
    }
}

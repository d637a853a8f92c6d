//! Rate limit policy definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::error::{FloodgateError, Result};

/// Counting algorithm for a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Aligned windows that reset sharply at each boundary. A client can
    /// burst up to twice the limit across a boundary.
    FixedWindow,
    /// A trailing log evaluated over a continuously moving interval, so the
    /// limit holds for any trailing window of the configured length.
    SlidingWindow,
}

/// An immutable rate limit: how many permits one partition may consume
/// within one window.
///
/// Policies are created from configuration at process start and shared
/// across concurrent evaluations; they are never mutated.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    permit_limit: u32,
    window: Duration,
    algorithm: Algorithm,
}

impl Policy {
    /// Create a policy, rejecting non-positive limits or windows.
    pub fn new(
        name: impl Into<String>,
        permit_limit: u32,
        window: Duration,
        algorithm: Algorithm,
    ) -> Result<Self> {
        let name = name.into();
        if permit_limit == 0 {
            return Err(FloodgateError::Config(format!(
                "Policy {}: permit limit must be at least 1",
                name
            )));
        }
        if window.is_zero() {
            return Err(FloodgateError::Config(format!(
                "Policy {}: window must be positive",
                name
            )));
        }

        Ok(Self {
            name,
            permit_limit,
            window,
            algorithm,
        })
    }

    /// Build a policy from its configuration section.
    pub fn from_config(name: &str, config: &PolicyConfig) -> Result<Self> {
        Self::new(
            name,
            config.permit_limit,
            Duration::from_secs(config.window_secs),
            config.algorithm,
        )
    }

    /// Name of this policy, used to namespace its store keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum permits per window.
    pub fn permit_limit(&self) -> u32 {
        self.permit_limit
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counting algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

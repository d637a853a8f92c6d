//! Configuration management for Floodgate.
//!
//! Configuration is loaded once at startup and never mutated afterwards.
//! [`FloodgateConfig::from_file`] layers `FLOODGATE_`-prefixed environment
//! variables on top of a YAML file, so deployments can override individual
//! settings (e.g. `FLOODGATE_STORE__URL`) without editing the file.

use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};
use crate::ratelimit::Algorithm;

/// Main configuration for a Floodgate deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limit policies
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Address of the shared store, e.g. `redis://127.0.0.1:6379`
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Upper bound on any single store round-trip, in milliseconds
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Behavior when the store cannot be consulted
    #[serde(default)]
    pub failure_mode: FailureMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            operation_timeout_ms: default_operation_timeout_ms(),
            failure_mode: FailureMode::default(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_operation_timeout_ms() -> u64 {
    1000
}

/// Behavior when the shared counter store is unreachable or times out.
///
/// The default is [`Closed`](FailureMode::Closed): when the store is down
/// the limiter cannot prove capacity, and the limit it enforces usually
/// protects a downstream quota. With `closed`, the outage surfaces to the
/// caller as [`StoreUnavailable`](crate::error::FloodgateError), which an
/// HTTP boundary is expected to map to 503. With `open`, requests are
/// admitted and the outage is logged at warning level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Admit requests while the store is unavailable.
    Open,
    /// Refuse requests while the store is unavailable.
    #[default]
    Closed,
}

/// The configured rate limit policies.
///
/// Two policies are always active: a per-identity policy, where every
/// identity gets its own counter, and a global policy shared by all
/// requests. A request must clear both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Limit applied to each identity separately
    #[serde(default = "default_identity_policy")]
    pub identity: PolicyConfig,

    /// Limit applied to all requests together
    #[serde(default = "default_global_policy")]
    pub global: PolicyConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            identity: default_identity_policy(),
            global: default_global_policy(),
        }
    }
}

fn default_identity_policy() -> PolicyConfig {
    PolicyConfig {
        permit_limit: 100,
        window_secs: 60,
        algorithm: Algorithm::SlidingWindow,
    }
}

fn default_global_policy() -> PolicyConfig {
    PolicyConfig {
        permit_limit: 1000,
        window_secs: 60,
        algorithm: Algorithm::SlidingWindow,
    }
}

/// Configuration for a single rate limit policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum permits per window, at least 1
    pub permit_limit: u32,

    /// Window length in seconds, at least 1
    pub window_secs: u64,

    /// Counting algorithm
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
}

fn default_algorithm() -> Algorithm {
    Algorithm::SlidingWindow
}

impl PolicyConfig {
    fn validate(&self, name: &str) -> Result<()> {
        if self.permit_limit == 0 {
            return Err(FloodgateError::Config(format!(
                "Policy {}: permit_limit must be at least 1",
                name
            )));
        }
        if self.window_secs == 0 {
            return Err(FloodgateError::Config(format!(
                "Policy {}: window_secs must be at least 1",
                name
            )));
        }
        Ok(())
    }
}

impl FloodgateConfig {
    /// Load configuration from a YAML file, with environment overrides.
    ///
    /// Variables are prefixed with `FLOODGATE_` and use `__` as the path
    /// separator, e.g. `FLOODGATE_LIMITS__IDENTITY__PERMIT_LIMIT=5`.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(std::path::Path::new(path)))
            .add_source(config::Environment::with_prefix("FLOODGATE").separator("__"))
            .build()
            .map_err(|e| FloodgateError::Config(e.to_string()))?;

        let config: FloodgateConfig = settings
            .try_deserialize()
            .map_err(|e| FloodgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FloodgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that must not serve traffic.
    pub fn validate(&self) -> Result<()> {
        self.limits.identity.validate("identity")?;
        self.limits.global.validate("global")?;
        if self.store.operation_timeout_ms == 0 {
            return Err(FloodgateError::Config(
                "store.operation_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured store operation timeout.
    pub fn operation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store.operation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FloodgateConfig::default();
        assert_eq!(config.store.url, "redis://127.0.0.1:6379");
        assert_eq!(config.store.operation_timeout_ms, 1000);
        assert_eq!(config.store.failure_mode, FailureMode::Closed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
store:
  url: redis://cache.internal:6379
  operation_timeout_ms: 250
  failure_mode: open
limits:
  identity:
    permit_limit: 5
    window_secs: 5
  global:
    permit_limit: 10
    window_secs: 10
    algorithm: fixed_window
"#;
        let config = FloodgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.url, "redis://cache.internal:6379");
        assert_eq!(config.store.failure_mode, FailureMode::Open);
        assert_eq!(config.limits.identity.permit_limit, 5);
        assert_eq!(config.limits.identity.algorithm, Algorithm::SlidingWindow);
        assert_eq!(config.limits.global.algorithm, Algorithm::FixedWindow);
    }

    #[test]
    fn test_zero_permit_limit_rejected() {
        let yaml = r#"
limits:
  identity:
    permit_limit: 0
    window_secs: 5
"#;
        let err = FloodgateConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("permit_limit"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
limits:
  global:
    permit_limit: 10
    window_secs: 0
"#;
        let err = FloodgateConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("window_secs"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let yaml = r#"
store:
  operation_timeout_ms: 0
"#;
        let err = FloodgateConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("operation_timeout_ms"));
    }
}

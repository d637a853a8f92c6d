//! Store key layout for rate limit counters.

/// Identifies the counter for one (policy, partition) pair.
///
/// Rendered as `ratelimit:<policy>:<partition>`, so every process sharing
/// the store addresses the same counter for the same pair. Fixed-window
/// counters append the window-start bucket underneath this key; stale
/// buckets age out through their expiry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    policy: String,
    partition: String,
}

impl CounterKey {
    /// Create a key from a policy name and an opaque partition key.
    pub fn new(policy: &str, partition: &str) -> Self {
        Self {
            policy: policy.to_string(),
            partition: partition.to_string(),
        }
    }

    /// The policy this counter belongs to.
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// The partition this counter belongs to.
    pub fn partition(&self) -> &str {
        &self.partition
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ratelimit:{}:{}", self.policy, self.partition)
    }
}

//! Admission decisions returned by the engine.

use std::time::Duration;

/// The outcome of one admission check.
///
/// A denial is an expected business outcome, not an error: the HTTP boundary
/// maps it to 429 and should surface `retry_after` as a `Retry-After`
/// header. Decisions are ephemeral and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allowed {
        /// Permits left in the current window after this one.
        remaining: u64,
        /// Time until the window has fully reset.
        reset_after: Duration,
    },
    /// The partition is out of permits.
    Denied {
        /// Time until the partition next has capacity.
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Suggested wait before retrying, for denied decisions.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Denied { retry_after } => Some(*retry_after),
            Decision::Allowed { .. } => None,
        }
    }
}

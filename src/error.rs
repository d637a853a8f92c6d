//! Error types for the Floodgate crate.
//!
//! A denied request is not an error: denials are carried by
//! [`Decision`](crate::ratelimit::Decision). Errors cover configuration
//! problems (fatal at startup) and counter-store outages, which callers must
//! be able to tell apart from a denial.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The shared counter store could not be reached or timed out
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<redis::RedisError> for FloodgateError {
    fn from(err: redis::RedisError) -> Self {
        FloodgateError::StoreUnavailable(err.to_string())
    }
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;

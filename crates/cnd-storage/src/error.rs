//! Cache error types.
//!
//! These never cross the [`Cache`](crate::Cache) boundary; the front logs
//! them and answers with a miss.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Error reported by the Redis client.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key pattern could not be compiled.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Backend round trip exceeded the operation timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

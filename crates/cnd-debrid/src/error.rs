//! Client error types.

use thiserror::Error;

/// Errors from building or using the outbound clients outside the
/// resolution path.
#[derive(Debug, Error)]
pub enum DebridError {
    /// HTTP client error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, DebridError>;

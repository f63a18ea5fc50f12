//! Error types for the syncgate-store crate

use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during object store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend did not answer in time
    #[error("operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Backend returned an error or could not be reached
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Request rejected before reaching the backend
    #[error("invalid storage request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Whether a caller may retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Backend(_))
    }
}

//! Error types for the syncgate-core crate

use crate::prefix::ScopeError;
use syncgate_store::StoreError;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in object operations and change feeds
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key resolves outside the caller's scope
    #[error("access denied")]
    Forbidden,

    /// Malformed request input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Object not found (only where revealing absence is safe)
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend timed out or failed; the caller may retry
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Unexpected failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether a caller may retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<ScopeError> for CoreError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Empty => CoreError::InvalidArgument("key must not be empty".to_string()),
            ScopeError::TooLong => CoreError::InvalidArgument(err.to_string()),
            // Traversal and foreign roots look the same to the caller
            ScopeError::OutOfScope => CoreError::Forbidden,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout { .. } | StoreError::Backend(_) => {
                CoreError::StorageUnavailable(err.to_string())
            }
            StoreError::InvalidRequest(msg) => CoreError::InvalidArgument(msg),
            StoreError::Configuration(msg) => CoreError::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization error: {}", err))
    }
}

//! Error types for the offline sync crate.

use greenmate_core::sync::{classify_http_status, SyncRetryClass};
use thiserror::Error;

/// Result type alias for offline sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while replaying a queued mutation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP client error (connect, timeout, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the GreenMate API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The queued item cannot be turned into a request (missing id, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Local storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] greenmate_core::Error),
}

impl SyncError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(_) => SyncRetryClass::Retryable,
            Self::Json(_) => SyncRetryClass::Permanent,
            Self::InvalidRequest(_) => SyncRetryClass::Permanent,
            Self::Storage(_) => SyncRetryClass::Retryable,
        }
    }
}

//! Error types shared by the GreenMate core crate.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a [`crate::storage::KeyValueStore`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would push the store past its byte capacity.
    #[error("Storage quota exceeded: {requested} bytes requested, capacity {capacity} bytes")]
    QuotaExceeded { requested: usize, capacity: usize },

    /// Any other backend failure (I/O, SQL, poisoned lock).
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Top-level core error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the underlying storage rejected a write for lack of space.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Storage(StorageError::QuotaExceeded { .. }))
    }
}

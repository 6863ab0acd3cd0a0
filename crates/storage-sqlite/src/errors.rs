use greenmate_core::errors::{Error, StorageError as CoreStorageError};
use thiserror::Error;

/// SQLite-layer failures, converted into core storage errors at the crate edge.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write of {requested} bytes exceeds capacity {capacity}")]
    QuotaExceeded { requested: usize, capacity: usize },
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded {
                requested,
                capacity,
            } => Error::Storage(CoreStorageError::QuotaExceeded {
                requested,
                capacity,
            }),
            other => Error::Storage(CoreStorageError::Backend(other.to_string())),
        }
    }
}

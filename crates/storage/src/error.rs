//! Storage error types.

use thiserror::Error;

/// Errors raised while resolving source folders or maintaining the archive cache.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("archive build failed: {0}")]
    Build(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<folio_core::Error> for StorageError {
    fn from(err: folio_core::Error) -> Self {
        match err {
            folio_core::Error::InvalidPath(msg) => Self::InvalidPath(msg),
            other => Self::InvalidPath(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

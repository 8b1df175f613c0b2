//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
///
/// Absence of content is not an error: read operations return `Ok(None)`
/// for missing artifacts. `NotFound` is reserved for operations that
/// require the artifact to exist.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

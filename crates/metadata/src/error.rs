//! Ledger error types.

use thiserror::Error;

/// Ledger operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid record data: {0}")]
    InvalidRecord(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for ledger operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

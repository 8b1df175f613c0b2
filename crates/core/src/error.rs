//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid repository path: {0}")]
    InvalidRepositoryPath(String),

    #[error("unknown storage: {0}")]
    UnknownStorage(String),

    #[error("unknown repository: {storage}:{repository}")]
    UnknownRepository { storage: String, repository: String },

    #[error("group membership cycle: {0}")]
    GroupCycle(String),

    #[error("invalid routing pattern {pattern:?}: {reason}")]
    InvalidRoutingPattern { pattern: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

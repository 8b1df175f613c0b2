//! Resolution error types.
//!
//! Absence is not an error anywhere in the engine: providers return
//! `Ok(None)` for paths they cannot satisfy, and group resolution treats
//! that as the normal "try the next member" branch.

use thiserror::Error;

/// Resolution and management errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The remote origin is known to be down; failed fast without connecting.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Transport-level failure talking to a remote origin, including
    /// exhausted retries.
    #[error("transport error: {0}")]
    Transport(String),

    /// Bounded wait for a per-path lock expired.
    #[error("lock wait timed out for {0}")]
    LockTimeout(String),

    /// Operation disallowed by repository flags or policy.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// Group membership cycle encountered during resolution.
    #[error("group membership cycle at {0}")]
    GroupCycle(String),

    #[error(transparent)]
    Storage(#[from] depot_storage::StorageError),

    #[error(transparent)]
    Ledger(#[from] depot_metadata::MetadataError),

    #[error(transparent)]
    Core(#[from] depot_core::Error),
}

/// Result type for resolution operations.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

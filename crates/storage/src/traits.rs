//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::RepositoryPath;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Metadata about a stored artifact.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Artifact size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<time::OffsetDateTime>,
}

/// Physical artifact storage keyed by repository path.
///
/// Writes are atomic: content becomes visible under its final path only
/// after [`StreamingWrite::finish`] (or `put_bytes`) completes, so readers
/// never observe partially written artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Check if an artifact exists.
    async fn exists(&self, path: &RepositoryPath) -> StorageResult<bool>;

    /// Get artifact metadata without fetching content. `None` when absent.
    async fn meta(&self, path: &RepositoryPath) -> StorageResult<Option<ObjectMeta>>;

    /// Read the full artifact into memory. `None` when absent.
    async fn read_bytes(&self, path: &RepositoryPath) -> StorageResult<Option<Bytes>>;

    /// Open the artifact as a byte stream. `None` when absent.
    async fn open_stream(&self, path: &RepositoryPath) -> StorageResult<Option<ByteStream>>;

    /// Start a streaming write. Content is staged in a temporary location
    /// until `finish` publishes it.
    async fn begin_write(&self, path: &RepositoryPath) -> StorageResult<Box<dyn StreamingWrite>>;

    /// Write a full artifact atomically.
    async fn put_bytes(&self, path: &RepositoryPath, data: Bytes) -> StorageResult<()>;

    /// Permanently delete an artifact. Returns whether it existed.
    async fn delete(&self, path: &RepositoryPath) -> StorageResult<bool>;

    /// Move an artifact into the repository trash instead of deleting it.
    /// Returns whether it existed.
    async fn move_to_trash(&self, path: &RepositoryPath) -> StorageResult<bool>;

    /// Verify the backend is reachable and writable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Trait for streaming writes.
#[async_trait]
pub trait StreamingWrite: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Publish the artifact and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Discard the staged content.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

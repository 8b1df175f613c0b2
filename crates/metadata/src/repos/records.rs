//! Artifact record repository.

use crate::error::MetadataResult;
use crate::models::{ArtifactRecordRow, RecordCriteria};
use async_trait::async_trait;
use depot_core::RepositoryPath;
use time::OffsetDateTime;

/// Repository for artifact record operations.
///
/// The unique key is (storage_id, repository_id, path); all mutations are
/// single-statement upserts or updates so they stay atomic under concurrent
/// callers without application-level read-modify-write.
#[async_trait]
pub trait ArtifactRecordRepo: Send + Sync {
    /// Create or update the record after a successful content write.
    ///
    /// Sets size, last_updated and coordinates; preserves download_count,
    /// last_used and tags of an existing record.
    async fn upsert_stored(&self, record: &ArtifactRecordRow) -> MetadataResult<()>;

    /// Record one completed read: increment download_count and refresh
    /// last_used in a single atomic statement. Creates the record if the
    /// content predates the ledger.
    async fn touch_download(
        &self,
        path: &RepositoryPath,
        used_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Get the record for a path.
    async fn get_record(&self, path: &RepositoryPath) -> MetadataResult<Option<ArtifactRecordRow>>;

    /// Whether a record exists for a path.
    async fn record_exists(&self, path: &RepositoryPath) -> MetadataResult<bool>;

    /// Add a tag to the record's tag set. No-op when already present.
    async fn set_tag(&self, path: &RepositoryPath, tag: &str) -> MetadataResult<()>;

    /// Remove a tag from the record's tag set. No-op when absent.
    async fn clear_tag(&self, path: &RepositoryPath, tag: &str) -> MetadataResult<()>;

    /// Find records matching all populated criteria fields, ordered by
    /// (storage_id, repository_id, path) for deterministic sweeps.
    async fn search_records(
        &self,
        criteria: &RecordCriteria,
    ) -> MetadataResult<Vec<ArtifactRecordRow>>;

    /// Count records matching the criteria.
    async fn count_records(&self, criteria: &RecordCriteria) -> MetadataResult<u64>;

    /// Delete the record for a path. Returns whether a record was removed.
    async fn delete_record(&self, path: &RepositoryPath) -> MetadataResult<bool>;

    /// Delete a batch of records within one repository. Returns the number
    /// of records removed. All deletions commit together.
    async fn delete_records_batch(
        &self,
        storage_id: &str,
        repository_id: &str,
        paths: &[String],
    ) -> MetadataResult<u64>;
}

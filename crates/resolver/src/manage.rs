//! Artifact management service: the deploy/delete path.

use crate::engine::ResolverState;
use crate::error::{ResolveError, ResolveResult};
use bytes::Bytes;
use depot_core::coordinates::{artifact_prefix_of, compare_versions};
use depot_core::{ArtifactCoordinates, RepoKey, Repository, RepositoryPath};
use depot_metadata::{ArtifactRecordRow, RecordCriteria, TAG_LAST_VERSION};
use futures::{Stream, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{instrument, warn};

/// Store and delete operations with repository policy enforcement.
pub struct ArtifactManagementService {
    state: Arc<ResolverState>,
}

impl ArtifactManagementService {
    pub fn new(state: Arc<ResolverState>) -> Self {
        Self { state }
    }

    fn repository(&self, path: &RepositoryPath) -> ResolveResult<&Repository> {
        let key = RepoKey::new(path.storage_id(), path.repository_id());
        self.state.index.repository(&key).ok_or_else(|| {
            depot_core::Error::UnknownRepository {
                storage: path.storage_id().to_string(),
                repository: path.repository_id().to_string(),
            }
            .into()
        })
    }

    /// Deploy an artifact, streaming the body to a temp location and
    /// publishing atomically under the exclusive path lock. Returns bytes
    /// written.
    #[instrument(skip(self, path, body), fields(path = %path))]
    pub async fn store<S>(&self, path: &RepositoryPath, mut body: S) -> ResolveResult<u64>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin,
    {
        let repository = self.repository(path)?;
        if repository.is_group() {
            return Err(ResolveError::PolicyViolation(format!(
                "cannot deploy to group repository {}",
                repository.id
            )));
        }
        if !repository.allows_deployment {
            return Err(ResolveError::PolicyViolation(format!(
                "repository {} does not allow deployment",
                repository.id
            )));
        }
        let coordinates = ArtifactCoordinates::from_path(path.relative_path());
        if let Some(coords) = &coordinates
            && !repository.policy.accepts_version(&coords.version)
        {
            return Err(ResolveError::PolicyViolation(format!(
                "version {} violates the {:?} policy of repository {}",
                coords.version, repository.policy, repository.id
            )));
        }

        let allows_redeployment = repository.allows_redeployment;
        let _guard = self.state.locks.write(path).await?;
        // Metadata and checksum files are regenerated content and may always
        // be overwritten; the redeploy flag protects artifacts.
        if !allows_redeployment
            && !path.is_metadata()
            && !path.is_checksum()
            && self.state.store.exists(path).await?
        {
            return Err(ResolveError::PolicyViolation(format!(
                "repository {} does not allow redeployment of {}",
                path.repository_id(),
                path.relative_path()
            )));
        }

        let mut sink = self.state.store.begin_write(path).await?;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => sink.write(chunk).await?,
                Err(err) => {
                    sink.abort().await?;
                    return Err(ResolveError::Transport(format!(
                        "deploy stream failed: {err}"
                    )));
                }
            }
        }
        let written = sink.finish().await?;

        let now = OffsetDateTime::now_utc();
        let record = ArtifactRecordRow {
            storage_id: path.storage_id().to_string(),
            repository_id: path.repository_id().to_string(),
            path: path.relative_path().to_string(),
            size_bytes: Some(written as i64),
            last_updated: now,
            last_used: now,
            download_count: 0,
            coordinates: coordinates
                .as_ref()
                .and_then(|coords| serde_json::to_string(&coords.to_map()).ok()),
            tags: None,
        };
        self.state.records.upsert_stored(&record).await?;

        if let Some(coords) = &coordinates {
            self.update_last_version_tags(path, &coords.version).await?;
        }
        Ok(written)
    }

    /// Convenience for callers holding the full body in memory.
    pub async fn store_bytes(&self, path: &RepositoryPath, data: Bytes) -> ResolveResult<u64> {
        self.store(
            path,
            Box::pin(futures::stream::once(async move { Ok(data) })),
        )
        .await
    }

    /// Delete an artifact. Trash-enabled repositories move content under
    /// `.trash/` instead of erasing it, force or not; the ledger record goes
    /// away either way since it tracks live content only. Returns whether
    /// the artifact existed.
    #[instrument(skip(self, path), fields(path = %path))]
    pub async fn delete(&self, path: &RepositoryPath, force: bool) -> ResolveResult<bool> {
        let repository = self.repository(path)?;
        if repository.is_group() {
            return Err(ResolveError::PolicyViolation(format!(
                "cannot delete from group repository {}",
                repository.id
            )));
        }
        if !repository.allows_delete {
            return Err(ResolveError::PolicyViolation(format!(
                "repository {} does not allow deletion",
                repository.id
            )));
        }
        if force && !repository.allows_force_deletion {
            return Err(ResolveError::PolicyViolation(format!(
                "repository {} does not allow force deletion",
                repository.id
            )));
        }

        let trash_enabled = repository.trash_enabled;
        let _guard = self.state.locks.write(path).await?;
        let existed = if trash_enabled {
            self.state.store.move_to_trash(path).await?
        } else {
            self.state.store.delete(path).await?
        };
        self.state.records.delete_record(path).await?;
        Ok(existed)
    }

    /// Keep the "last-version" tag on records of the newest stored version
    /// of this artifact; superseded versions lose it.
    async fn update_last_version_tags(
        &self,
        path: &RepositoryPath,
        stored_version: &str,
    ) -> ResolveResult<()> {
        let Some(prefix) = artifact_prefix_of(path.relative_path()) else {
            return Ok(());
        };
        let criteria = RecordCriteria::for_repository(path.storage_id(), path.repository_id())
            .with_path_prefix(&prefix);
        let records = self.state.records.search_records(&criteria).await?;

        let mut newest = stored_version.to_string();
        for record in &records {
            if let Some(version) = record.coordinates_map().get("version")
                && compare_versions(version, &newest) == Ordering::Greater
            {
                newest = version.clone();
            }
        }

        for record in &records {
            let Some(version) = record.coordinates_map().get("version").cloned() else {
                continue;
            };
            let record_path = match RepositoryPath::new(
                &record.storage_id,
                &record.repository_id,
                &record.path,
            ) {
                Ok(record_path) => record_path,
                Err(err) => {
                    warn!(path = %record.path, error = %err, "skipping malformed record path");
                    continue;
                }
            };
            if version == newest {
                self.state
                    .records
                    .set_tag(&record_path, TAG_LAST_VERSION)
                    .await?;
            } else {
                self.state
                    .records
                    .clear_tag(&record_path, TAG_LAST_VERSION)
                    .await?;
            }
        }
        Ok(())
    }
}

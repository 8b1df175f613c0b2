//! Background eviction of stale proxied content.

use crate::engine::ResolverState;
use crate::error::ResolveResult;
use crate::liveness::Liveness;
use depot_core::RepositoryPath;
use depot_metadata::RecordCriteria;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

/// Outcome of one eviction sweep.
#[derive(Clone, Copy, Debug, Default)]
pub struct CleanupStats {
    /// Candidate records examined.
    pub examined: u64,
    /// Records (and their physical files) removed.
    pub deleted: u64,
    /// Per-record failures, logged and skipped.
    pub failed: u64,
    /// Proxy repositories skipped entirely because the remote was down.
    pub skipped_repositories: u64,
}

/// Sweeps the ledger for proxied content that is both old and large enough
/// to evict. Only repositories whose remote is currently alive are touched:
/// evicting while the origin is down would make content unrecoverable.
/// Metadata files are refreshed in place, never evicted.
pub struct ExpiredArtifactCleaner {
    state: Arc<ResolverState>,
    probe_timeout: Duration,
}

impl ExpiredArtifactCleaner {
    pub fn new(state: Arc<ResolverState>, probe_timeout: Duration) -> Self {
        Self {
            state,
            probe_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn cleanup(
        &self,
        min_days_unused: u64,
        min_size_bytes: u64,
    ) -> ResolveResult<CleanupStats> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(min_days_unused as i64);
        let mut stats = CleanupStats::default();

        for (key, repository) in self.state.index.proxy_repositories() {
            let Some(remote) = repository.remote.as_ref() else {
                continue;
            };

            let alive = match self.state.liveness.verdict(&remote.url) {
                Liveness::Alive => true,
                Liveness::Down => false,
                Liveness::Unknown => match self.state.transport(key) {
                    Ok(client) => {
                        self.state
                            .liveness
                            .probe(client.as_ref(), &remote.url, self.probe_timeout)
                            .await
                    }
                    Err(err) => {
                        warn!(repository = %key, error = %err, "no transport; skipping repository");
                        false
                    }
                },
            };
            if !alive {
                warn!(repository = %key, "remote down; skipping eviction for repository");
                stats.skipped_repositories += 1;
                continue;
            }

            let criteria = RecordCriteria::for_repository(&key.storage_id, &key.repository_id)
                .with_last_used_before(cutoff)
                .with_min_size(min_size_bytes as i64);
            let candidates = self.state.records.search_records(&criteria).await?;

            for record in candidates {
                stats.examined += 1;
                let path = match RepositoryPath::new(
                    &record.storage_id,
                    &record.repository_id,
                    &record.path,
                ) {
                    Ok(path) => path,
                    Err(err) => {
                        warn!(path = %record.path, error = %err, "malformed record path; skipping");
                        stats.failed += 1;
                        continue;
                    }
                };
                if path.is_metadata() {
                    continue;
                }
                match self.evict(&path).await {
                    Ok(()) => stats.deleted += 1,
                    Err(err) => {
                        warn!(path = %path, error = %err, "eviction failed; continuing sweep");
                        stats.failed += 1;
                    }
                }
            }
        }

        info!(
            examined = stats.examined,
            deleted = stats.deleted,
            failed = stats.failed,
            skipped_repositories = stats.skipped_repositories,
            "eviction sweep finished"
        );
        Ok(stats)
    }

    /// Remove one artifact: file first, record second, under the exclusive
    /// path lock so in-flight readers are not yanked mid-stream.
    async fn evict(&self, path: &RepositoryPath) -> ResolveResult<()> {
        let _guard = self.state.locks.write(path).await?;
        self.state.store.delete(path).await?;
        self.state.records.delete_record(path).await?;
        Ok(())
    }
}

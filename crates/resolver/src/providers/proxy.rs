//! Proxy repository provider: local-first, fetch-and-cache on miss.

use crate::engine::ResolverState;
use crate::error::{ResolveError, ResolveResult};
use crate::fetch::{BufferWrite, RemoteFetchEngine};
use crate::providers::{ProviderRegistry, RepositoryProvider, ResolveContext};
use crate::transport::{RemoteClient, join_url};
use async_trait::async_trait;
use depot_core::{
    ArtifactCoordinates, RemoteRepository, RepoKey, Repository, RepositoryPath,
};
use depot_metadata::ArtifactRecordRow;
use depot_storage::ByteStream;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{instrument, warn};

pub struct ProxyProvider {
    state: Arc<ResolverState>,
}

impl ProxyProvider {
    pub fn new(state: Arc<ResolverState>) -> Self {
        Self { state }
    }

    fn repository(&self, key: &RepoKey) -> Option<&Repository> {
        self.state.index.repository(key)
    }

    /// Whether the local copy can be served without touching the remote.
    /// Non-metadata artifacts are immutable once cached; metadata files age
    /// out after the remote's staleness window.
    async fn is_cached_fresh(
        &self,
        remote: &RemoteRepository,
        path: &RepositoryPath,
    ) -> ResolveResult<bool> {
        let Some(meta) = self.state.store.meta(path).await? else {
            return Ok(false);
        };
        if !path.is_metadata() {
            return Ok(true);
        }
        let Some(modified) = meta.last_modified else {
            return Ok(false);
        };
        let age = OffsetDateTime::now_utc() - modified;
        Ok(age <= time::Duration::seconds(remote.metadata_max_age_secs as i64))
    }

    /// Make sure the path is locally cached and fresh, fetching from the
    /// remote under the exclusive path lock when needed. Returns whether
    /// content is available locally afterwards.
    async fn ensure_cached(
        &self,
        key: &RepoKey,
        remote: &RemoteRepository,
        path: &RepositoryPath,
    ) -> ResolveResult<bool> {
        if self.is_cached_fresh(remote, path).await? {
            return Ok(true);
        }

        let _guard = self.state.locks.write(path).await?;
        // Double-checked: a concurrent request may have fetched while this
        // one waited on the lock.
        if self.is_cached_fresh(remote, path).await? {
            return Ok(true);
        }

        if self.state.liveness.is_known_down(&remote.url) {
            return Err(ResolveError::RemoteUnavailable(remote.url.clone()));
        }

        let client = self.state.transport(key)?.clone();
        let url = join_url(&remote.url, path.relative_path());
        let outcome = if path.is_metadata() {
            self.refresh_metadata(client.as_ref(), remote, &url, path).await
        } else {
            self.fetch_artifact(client.as_ref(), remote, &url, path).await
        };

        match outcome {
            Err(err @ ResolveError::RemoteUnavailable(_)) => {
                self.state.liveness.mark_down(&remote.url);
                Err(err)
            }
            Ok(available) => {
                self.state.liveness.mark_alive(&remote.url);
                Ok(available)
            }
            Err(err) => Err(err),
        }
    }

    /// Stream a regular artifact to a temp location and publish atomically.
    /// A remote 404 caches nothing; a failed fetch leaves no partial file at
    /// the canonical path.
    async fn fetch_artifact(
        &self,
        client: &dyn RemoteClient,
        remote: &RemoteRepository,
        url: &str,
        path: &RepositoryPath,
    ) -> ResolveResult<bool> {
        let mut sink = self.state.store.begin_write(path).await?;
        match RemoteFetchEngine::fetch(client, remote, url, sink.as_mut()).await {
            Ok(Some(written)) => {
                sink.finish().await?;
                self.record_stored(path, written).await?;
                Ok(true)
            }
            Ok(None) => {
                sink.abort().await?;
                Ok(false)
            }
            Err(err) => {
                sink.abort().await?;
                Err(err)
            }
        }
    }

    /// Refresh a metadata file: fetch into memory, merge with any existing
    /// local copy, publish the merged result. A remote 404 or failure keeps
    /// serving an existing local copy rather than dropping it.
    async fn refresh_metadata(
        &self,
        client: &dyn RemoteClient,
        remote: &RemoteRepository,
        url: &str,
        path: &RepositoryPath,
    ) -> ResolveResult<bool> {
        let existing = self.state.store.read_bytes(path).await?;

        let mut buffer = BufferWrite::default();
        let fetched = match RemoteFetchEngine::fetch(client, remote, url, &mut buffer).await {
            Ok(Some(_)) => buffer.into_bytes(),
            Ok(None) => return Ok(existing.is_some()),
            Err(err) => {
                if existing.is_some() {
                    warn!(url, error = %err, "metadata refresh failed; serving stale copy");
                    return Ok(true);
                }
                return Err(err);
            }
        };

        let merged = match &existing {
            Some(old) => self.state.merger.merge(old, &fetched),
            None => fetched,
        };
        let size = merged.len() as u64;
        self.state.store.put_bytes(path, merged).await?;
        self.record_stored(path, size).await?;
        Ok(true)
    }

    async fn record_stored(&self, path: &RepositoryPath, size: u64) -> ResolveResult<()> {
        let coordinates = ArtifactCoordinates::from_path(path.relative_path())
            .and_then(|coords| serde_json::to_string(&coords.to_map()).ok());
        let now = OffsetDateTime::now_utc();
        let record = ArtifactRecordRow {
            storage_id: path.storage_id().to_string(),
            repository_id: path.repository_id().to_string(),
            path: path.relative_path().to_string(),
            size_bytes: Some(size as i64),
            last_updated: now,
            last_used: now,
            download_count: 0,
            coordinates,
            tags: None,
        };
        self.state.records.upsert_stored(&record).await?;
        Ok(())
    }
}

#[async_trait]
impl RepositoryProvider for ProxyProvider {
    #[instrument(skip(self, _registry, path, _ctx), fields(path = %path))]
    async fn fetch_path(
        &self,
        _registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        _ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<RepositoryPath>> {
        let Some(repository) = self.repository(key) else {
            return Ok(None);
        };
        if !repository.in_service {
            return Ok(None);
        }
        let Some(remote) = repository.remote.as_ref() else {
            return Ok(None);
        };
        if self.ensure_cached(key, remote, path).await? {
            Ok(Some(path.clone()))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self, registry, path, ctx), fields(path = %path))]
    async fn open_stream(
        &self,
        registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<ByteStream>> {
        if self.fetch_path(registry, key, path, ctx).await?.is_none() {
            return Ok(None);
        }
        let _guard = self.state.locks.read(path).await?;
        let Some(stream) = self.state.store.open_stream(path).await? else {
            return Ok(None);
        };
        self.state
            .records
            .touch_download(path, OffsetDateTime::now_utc())
            .await?;
        Ok(Some(stream))
    }
}

//! Hosted repository provider: local content only.

use crate::engine::ResolverState;
use crate::error::ResolveResult;
use crate::providers::{ProviderRegistry, RepositoryProvider, ResolveContext};
use async_trait::async_trait;
use depot_core::{RepoKey, RepositoryPath};
use depot_storage::ByteStream;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

pub struct HostedProvider {
    state: Arc<ResolverState>,
}

impl HostedProvider {
    pub fn new(state: Arc<ResolverState>) -> Self {
        Self { state }
    }

    fn in_service(&self, key: &RepoKey) -> bool {
        self.state
            .index
            .repository(key)
            .is_some_and(|repository| repository.in_service)
    }
}

#[async_trait]
impl RepositoryProvider for HostedProvider {
    #[instrument(skip(self, _registry, path, _ctx), fields(path = %path))]
    async fn fetch_path(
        &self,
        _registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        _ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<RepositoryPath>> {
        if !self.in_service(key) {
            return Ok(None);
        }
        if self.state.store.exists(path).await? {
            Ok(Some(path.clone()))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self, _registry, path, _ctx), fields(path = %path))]
    async fn open_stream(
        &self,
        _registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        _ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<ByteStream>> {
        if !self.in_service(key) {
            return Ok(None);
        }
        // Shared lock: concurrent reads proceed, an in-progress write on the
        // same path is waited out.
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

//! Group repository provider: ordered fan-out over members.

use crate::engine::ResolverState;
use crate::error::ResolveResult;
use crate::providers::{ProviderRegistry, RepositoryProvider, ResolveContext};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{RepoKey, Repository, RepositoryPath};
use depot_storage::ByteStream;
use std::sync::Arc;
use tracing::instrument;

pub struct GroupProvider {
    state: Arc<ResolverState>,
}

impl GroupProvider {
    pub fn new(state: Arc<ResolverState>) -> Self {
        Self { state }
    }

    fn repository(&self, key: &RepoKey) -> Option<&Repository> {
        self.state.index.repository(key)
    }

    /// Members eligible for this path: in service and allowed by the
    /// routing rules, in configured fan-out order.
    fn eligible_members(&self, group: &RepoKey, path: &RepositoryPath) -> Vec<RepoKey> {
        self.state
            .index
            .members_of(group)
            .iter()
            .filter(|member| {
                self.state
                    .index
                    .repository(member)
                    .is_some_and(|repository| repository.in_service)
            })
            .filter(|member| {
                self.state
                    .routing
                    .is_path_accepted(group, member, path.relative_path())
            })
            .cloned()
            .collect()
    }

    /// First-match resolution over eligible members.
    async fn resolve_first(
        &self,
        registry: &ProviderRegistry,
        group: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<RepositoryPath>> {
        for member in self.eligible_members(group, path) {
            let Some(repository) = self.repository(&member) else {
                continue;
            };
            let member_path = path.relocated(&member.storage_id, &member.repository_id);
            let resolved = registry
                .provider_for(repository.repository_type)
                .fetch_path(registry, &member, &member_path, ctx)
                .await?;
            if resolved.is_some() {
                return Ok(resolved);
            }
        }
        Ok(None)
    }

    /// Metadata aggregation: every eligible member contributes (refreshing
    /// stale proxy copies along the way) and the contributions are merged,
    /// instead of returning the first hit verbatim.
    async fn merged_metadata(
        &self,
        registry: &ProviderRegistry,
        group: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<Bytes>> {
        let mut merged: Option<Bytes> = None;
        for member in self.eligible_members(group, path) {
            let Some(repository) = self.repository(&member) else {
                continue;
            };
            let member_path = path.relocated(&member.storage_id, &member.repository_id);
            let resolved = registry
                .provider_for(repository.repository_type)
                .fetch_path(registry, &member, &member_path, ctx)
                .await?;
            let Some(resolved) = resolved else {
                continue;
            };
            let Some(contribution) = self.state.store.read_bytes(&resolved).await? else {
                continue;
            };
            merged = Some(match merged {
                Some(existing) => self.state.merger.merge(&existing, &contribution),
                None => contribution,
            });
        }
        Ok(merged)
    }
}

#[async_trait]
impl RepositoryProvider for GroupProvider {
    #[instrument(skip(self, registry, path, ctx), fields(path = %path))]
    async fn fetch_path(
        &self,
        registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<RepositoryPath>> {
        let Some(repository) = self.repository(key) else {
            return Ok(None);
        };
        if !repository.in_service {
            return Ok(None);
        }
        ctx.enter(key)?;
        let result = self.resolve_first(registry, key, path, ctx).await;
        ctx.leave(key);
        result
    }

    #[instrument(skip(self, registry, path, ctx), fields(path = %path))]
    async fn open_stream(
        &self,
        registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<ByteStream>> {
        let Some(repository) = self.repository(key) else {
            return Ok(None);
        };
        if !repository.in_service {
            return Ok(None);
        }
        ctx.enter(key)?;
        let result = if path.is_metadata() {
            match self.merged_metadata(registry, key, path, ctx).await {
                Ok(Some(bytes)) => {
                    let stream: ByteStream =
                        Box::pin(futures::stream::once(async move { Ok(bytes) }));
                    Ok(Some(stream))
                }
                Ok(None) => Ok(None),
                Err(err) => Err(err),
            }
        } else {
            self.stream_first(registry, key, path, ctx).await
        };
        ctx.leave(key);
        result
    }
}

impl GroupProvider {
    /// First-match streaming for regular artifacts; the winning member's
    /// provider counts the download.
    async fn stream_first(
        &self,
        registry: &ProviderRegistry,
        group: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<ByteStream>> {
        for member in self.eligible_members(group, path) {
            let Some(repository) = self.repository(&member) else {
                continue;
            };
            let member_path = path.relocated(&member.storage_id, &member.repository_id);
            let stream = registry
                .provider_for(repository.repository_type)
                .open_stream(registry, &member, &member_path, ctx)
                .await?;
            if stream.is_some() {
                return Ok(stream);
            }
        }
        Ok(None)
    }
}

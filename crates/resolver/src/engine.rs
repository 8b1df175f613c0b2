//! Resolution engine wiring and entry points.

use crate::error::{ResolveError, ResolveResult};
use crate::liveness::AlivenessCache;
use crate::lock::PathLockTable;
use crate::merge::{LineUnionMerger, MetadataMerger};
use crate::providers::{ProviderRegistry, ResolveContext};
use crate::routing::RoutingRuleEngine;
use crate::transport::{HttpRemoteClient, RemoteClient};
use depot_core::{AppConfig, RepoKey, RepositoryIndex, RepositoryPath};
use depot_metadata::MetadataStore;
use depot_storage::{ArtifactStore, ByteStream};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Shared state behind all providers and the management/cleanup services.
pub struct ResolverState {
    pub index: Arc<RepositoryIndex>,
    pub store: Arc<dyn ArtifactStore>,
    pub records: Arc<dyn MetadataStore>,
    pub locks: PathLockTable,
    pub routing: RoutingRuleEngine,
    pub liveness: Arc<AlivenessCache>,
    pub merger: Box<dyn MetadataMerger>,
    /// One transport per proxy repository.
    pub transports: HashMap<RepoKey, Arc<dyn RemoteClient>>,
}

impl ResolverState {
    /// Transport for a proxy repository key.
    pub fn transport(&self, key: &RepoKey) -> ResolveResult<&Arc<dyn RemoteClient>> {
        self.transports
            .get(key)
            .ok_or_else(|| ResolveError::Transport(format!("no transport configured for {key}")))
    }
}

/// Facade over the provider registry: looks up the repository named by a
/// path and dispatches to the provider for its type.
pub struct Resolver {
    state: Arc<ResolverState>,
    registry: ProviderRegistry,
}

impl Resolver {
    /// Build the engine with reqwest transports, one per proxy repository.
    pub fn new(
        index: Arc<RepositoryIndex>,
        store: Arc<dyn ArtifactStore>,
        records: Arc<dyn MetadataStore>,
        config: &AppConfig,
        liveness: Arc<AlivenessCache>,
    ) -> ResolveResult<Self> {
        let mut transports: HashMap<RepoKey, Arc<dyn RemoteClient>> = HashMap::new();
        for (key, repository) in index.proxy_repositories() {
            let remote = repository.remote.as_ref().ok_or_else(|| {
                depot_core::Error::Configuration(format!("proxy {key} has no remote"))
            })?;
            transports.insert(key.clone(), Arc::new(HttpRemoteClient::new(remote)?));
        }
        Self::with_transports(index, store, records, config, liveness, transports)
    }

    /// Build the engine with caller-supplied transports. Used by tests that
    /// need byte-exact control over stream breaks.
    pub fn with_transports(
        index: Arc<RepositoryIndex>,
        store: Arc<dyn ArtifactStore>,
        records: Arc<dyn MetadataStore>,
        config: &AppConfig,
        liveness: Arc<AlivenessCache>,
        transports: HashMap<RepoKey, Arc<dyn RemoteClient>>,
    ) -> ResolveResult<Self> {
        let state = Arc::new(ResolverState {
            routing: RoutingRuleEngine::new(&config.routing)?,
            locks: PathLockTable::new(config.resolver.lock_timeout()),
            merger: Box::new(LineUnionMerger),
            index,
            store,
            records,
            liveness,
            transports,
        });
        Ok(Self {
            registry: ProviderRegistry::new(state.clone()),
            state,
        })
    }

    pub fn state(&self) -> Arc<ResolverState> {
        self.state.clone()
    }

    /// Resolve a path without counting a download. `Ok(None)` for unknown
    /// repositories and unresolvable paths alike.
    #[instrument(skip(self, path), fields(path = %path))]
    pub async fn fetch_path(&self, path: &RepositoryPath) -> ResolveResult<Option<RepositoryPath>> {
        let key = RepoKey::new(path.storage_id(), path.repository_id());
        let Some(repository) = self.state.index.repository(&key) else {
            return Ok(None);
        };
        let mut ctx = ResolveContext::default();
        self.registry
            .provider_for(repository.repository_type)
            .fetch_path(&self.registry, &key, path, &mut ctx)
            .await
    }

    /// Resolve and open content for reading; counts a download on success.
    #[instrument(skip(self, path), fields(path = %path))]
    pub async fn open_stream(&self, path: &RepositoryPath) -> ResolveResult<Option<ByteStream>> {
        let key = RepoKey::new(path.storage_id(), path.repository_id());
        let Some(repository) = self.state.index.repository(&key) else {
            return Ok(None);
        };
        let mut ctx = ResolveContext::default();
        self.registry
            .provider_for(repository.repository_type)
            .open_stream(&self.registry, &key, path, &mut ctx)
            .await
    }
}

//! Repository providers: one resolution strategy per repository type.

pub mod group;
pub mod hosted;
pub mod proxy;

use crate::engine::ResolverState;
use crate::error::{ResolveError, ResolveResult};
use async_trait::async_trait;
use depot_core::{RepoKey, RepositoryPath, RepositoryType};
use depot_storage::ByteStream;
use std::collections::HashSet;
use std::sync::Arc;

pub use group::GroupProvider;
pub use hosted::HostedProvider;
pub use proxy::ProxyProvider;

/// Per-request recursion state: the trail of group repositories currently
/// being resolved, for cycle detection.
#[derive(Default)]
pub struct ResolveContext {
    visited: HashSet<RepoKey>,
}

impl ResolveContext {
    /// Mark a group as being resolved. Fails on revisit.
    pub fn enter(&mut self, key: &RepoKey) -> ResolveResult<()> {
        if !self.visited.insert(key.clone()) {
            return Err(ResolveError::GroupCycle(key.to_string()));
        }
        Ok(())
    }

    /// Unmark on the way out so diamond-shaped membership (two siblings
    /// sharing a nested group) is not mistaken for a cycle.
    pub fn leave(&mut self, key: &RepoKey) {
        self.visited.remove(key);
    }
}

/// Resolution strategy for one repository type.
///
/// Both operations model absence as `Ok(None)`; the registry is passed in
/// so group providers can recurse into member providers.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Resolve a path to the concrete repository that holds it, fetching
    /// and caching remote content when needed. Does not count a download.
    async fn fetch_path(
        &self,
        registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<RepositoryPath>>;

    /// Resolve and open the content for reading, counting a download on
    /// success.
    async fn open_stream(
        &self,
        registry: &ProviderRegistry,
        key: &RepoKey,
        path: &RepositoryPath,
        ctx: &mut ResolveContext,
    ) -> ResolveResult<Option<ByteStream>>;
}

/// Closed provider dispatch over the three repository types, populated at
/// construction. An unknown type is unrepresentable.
pub struct ProviderRegistry {
    hosted: HostedProvider,
    proxy: ProxyProvider,
    group: GroupProvider,
}

impl ProviderRegistry {
    pub fn new(state: Arc<ResolverState>) -> Self {
        Self {
            hosted: HostedProvider::new(state.clone()),
            proxy: ProxyProvider::new(state.clone()),
            group: GroupProvider::new(state),
        }
    }

    pub fn provider_for(&self, repository_type: RepositoryType) -> &dyn RepositoryProvider {
        match repository_type {
            RepositoryType::Hosted => &self.hosted,
            RepositoryType::Proxy => &self.proxy,
            RepositoryType::Group => &self.group,
        }
    }
}

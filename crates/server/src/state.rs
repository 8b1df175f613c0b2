//! Shared application state.

use depot_core::{AppConfig, RepositoryIndex};
use depot_metadata::MetadataStore;
use depot_resolver::{AlivenessCache, ArtifactManagementService, ExpiredArtifactCleaner, Resolver};
use depot_storage::ArtifactStore;
use std::sync::Arc;
use tracing::warn;

/// State handed to every handler. Cloning is cheap; everything is behind
/// an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub index: Arc<RepositoryIndex>,
    pub resolver: Arc<Resolver>,
    pub management: Arc<ArtifactManagementService>,
    pub cleaner: Arc<ExpiredArtifactCleaner>,
    pub store: Arc<dyn ArtifactStore>,
    pub records: Arc<dyn MetadataStore>,
    pub liveness: Arc<AlivenessCache>,
}

impl AppState {
    /// Validate the configuration and wire up the resolution engine.
    ///
    /// Configuration warnings are logged; hard configuration errors abort.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ArtifactStore>,
        records: Arc<dyn MetadataStore>,
    ) -> anyhow::Result<Self> {
        match config.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    warn!("configuration: {warning}");
                }
            }
            Err(error) => anyhow::bail!("invalid configuration: {error}"),
        }

        let index = Arc::new(RepositoryIndex::build(&config.storages)?);
        let liveness = Arc::new(AlivenessCache::new(config.liveness.ttl()));
        let resolver = Arc::new(Resolver::new(
            index.clone(),
            store.clone(),
            records.clone(),
            &config,
            liveness.clone(),
        )?);
        let management = Arc::new(ArtifactManagementService::new(resolver.state()));
        let cleaner = Arc::new(ExpiredArtifactCleaner::new(
            resolver.state(),
            config.liveness.probe_timeout(),
        ));

        Ok(Self {
            config: Arc::new(config),
            index,
            resolver,
            management,
            cleaner,
            store,
            records,
            liveness,
        })
    }
}

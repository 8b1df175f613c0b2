//! Repository resolution engine.
//!
//! Dispatches artifact requests to hosted, proxy, and group repository
//! providers, caches remote content with resumable downloads, and runs
//! the management (deploy/delete) and eviction services on top of the
//! same shared state.

pub mod cleaner;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod liveness;
pub mod lock;
pub mod manage;
pub mod merge;
pub mod providers;
pub mod routing;
pub mod transport;

pub use cleaner::{CleanupStats, ExpiredArtifactCleaner};
pub use engine::{Resolver, ResolverState};
pub use error::{ResolveError, ResolveResult};
pub use fetch::{BufferWrite, RemoteFetchEngine};
pub use liveness::{AlivenessCache, Liveness};
pub use lock::PathLockTable;
pub use manage::ArtifactManagementService;
pub use merge::{LineUnionMerger, MetadataMerger};
pub use providers::{ProviderRegistry, RepositoryProvider, ResolveContext};
pub use routing::RoutingRuleEngine;
pub use transport::{BodyStream, HttpRemoteClient, RemoteClient, RemoteHead, join_url};

//! Core domain types and shared logic for the depot artifact repository manager.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Repository paths and canonicalization
//! - Repository topology (storages, hosted/proxy/group repositories)
//! - Maven-style artifact coordinates
//! - Routing rule configuration
//! - Application configuration and validation

pub mod config;
pub mod coordinates;
pub mod error;
pub mod index;
pub mod path;
pub mod repository;
pub mod routing;

pub use config::{AppConfig, CleanupConfig, LivenessConfig, Storage};
pub use coordinates::ArtifactCoordinates;
pub use error::{Error, Result};
pub use index::{RepoKey, RepositoryIndex};
pub use path::RepositoryPath;
pub use repository::{RemoteRepository, Repository, RepositoryPolicy, RepositoryType};
pub use routing::{RoutingRule, RoutingRules, RuleSet};

/// Base name of Maven repository metadata files.
pub const METADATA_BASENAME: &str = "maven-metadata.xml";

/// Default repository layout identifier.
pub const DEFAULT_LAYOUT: &str = "maven2";

/// Group id that makes a routing rule set apply to every group repository.
pub const WILDCARD_GROUP: &str = "*";

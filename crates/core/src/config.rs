//! Configuration types shared across crates.

use crate::index::RepositoryIndex;
use crate::repository::Repository;
use crate::routing::RoutingRules;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// When enabled, restrict the endpoint to scraper IPs at the
    /// infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Physical artifact storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory. Artifacts live at `<root>/<storage>/<repository>/<path>`.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/storage")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

/// Artifact record ledger configuration (SQLite).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Database file path.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("./data/depot.db")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

/// Resolution engine tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Bound on waiting for a per-path lock, in seconds.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

fn default_lock_timeout_secs() -> u64 {
    60
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

impl ResolverConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Validate resolver configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.lock_timeout_secs == 0 {
            return Err("resolver.lock_timeout_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Expired proxy content cleanup configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Enable the scheduled sweep (disabled by default; the admin endpoint
    /// can still trigger sweeps on demand).
    #[serde(default)]
    pub enabled: bool,
    /// Interval in seconds between scheduled sweeps.
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    /// Evict proxied artifacts not used for at least this many days.
    #[serde(default = "default_min_days_unused")]
    pub min_days_unused: u64,
    /// Evict only artifacts at least this large, in bytes.
    #[serde(default)]
    pub min_size_bytes: u64,
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_min_days_unused() -> u64 {
    30
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_cleanup_interval_secs(),
            min_days_unused: default_min_days_unused(),
            min_size_bytes: 0,
        }
    }
}

impl CleanupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate cleanup configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.interval_secs == 0 {
            return Err(
                "cleanup.interval_secs cannot be 0 when the schedule is enabled. \
                 This would cause a panic when creating the sweep timer."
                    .to_string(),
            );
        }
        if self.min_days_unused > i64::MAX as u64 / 86_400 {
            return Err(format!(
                "cleanup.min_days_unused {} is too large (would overflow a Duration)",
                self.min_days_unused
            ));
        }
        Ok(())
    }
}

/// Remote liveness cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Interval in seconds between background probe rounds.
    #[serde(default = "default_liveness_refresh_secs")]
    pub refresh_interval_secs: u64,
    /// Age after which a cached verdict no longer counts as known.
    #[serde(default = "default_liveness_ttl_secs")]
    pub ttl_secs: u64,
    /// Per-probe timeout in seconds.
    #[serde(default = "default_liveness_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_liveness_refresh_secs() -> u64 {
    60
}

fn default_liveness_ttl_secs() -> u64 {
    120
}

fn default_liveness_probe_timeout_secs() -> u64 {
    5
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_liveness_refresh_secs(),
            ttl_secs: default_liveness_ttl_secs(),
            probe_timeout_secs: default_liveness_probe_timeout_secs(),
        }
    }
}

impl LivenessConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Validate liveness configuration invariants.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        if self.refresh_interval_secs == 0 {
            return Err("liveness.refresh_interval_secs cannot be 0".to_string());
        }
        if self.ttl_secs < self.refresh_interval_secs {
            warnings.push(format!(
                "liveness.ttl_secs={} is shorter than refresh_interval_secs={}; \
                 verdicts will expire between refresh rounds and remotes will be \
                 treated as alive in the gap.",
                self.ttl_secs, self.refresh_interval_secs
            ));
        }
        Ok(warnings)
    }
}

/// A logical storage holding repositories.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Storage {
    pub id: String,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl Storage {
    pub fn repository(&self, id: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.id == id)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    /// Repository topology.
    #[serde(default)]
    pub storages: Vec<Storage>,
    /// Routing rules, evaluated by group repositories.
    #[serde(default)]
    pub routing: RoutingRules,
}

impl AppConfig {
    /// Validate the whole configuration.
    ///
    /// Returns warnings for settings that are suspicious but allowed, and an
    /// error for configurations that must not start.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        self.resolver.validate()?;
        self.cleanup.validate()?;
        warnings.extend(self.liveness.validate()?);

        if self.storages.is_empty() {
            warnings.push("no storages configured; every request will return 404".to_string());
        }

        let mut storage_ids = HashSet::new();
        for storage in &self.storages {
            if storage.id.is_empty() {
                return Err("storage id cannot be empty".to_string());
            }
            if !storage_ids.insert(storage.id.as_str()) {
                return Err(format!("duplicate storage id: {}", storage.id));
            }
            let mut repository_ids = HashSet::new();
            for repository in &storage.repositories {
                repository.validate()?;
                if !repository_ids.insert(repository.id.as_str()) {
                    return Err(format!(
                        "duplicate repository id {} in storage {}",
                        repository.id, storage.id
                    ));
                }
                if repository.is_group() && repository.members.is_empty() {
                    warnings.push(format!(
                        "group repository {}:{} has no members",
                        storage.id, repository.id
                    ));
                }
            }
        }

        // Member references and membership cycles.
        RepositoryIndex::build(&self.storages).map_err(|e| e.to_string())?;

        self.routing.validate().map_err(|e| e.to_string())?;
        for rule_set in self.routing.accepted.iter().chain(self.routing.denied.iter()) {
            if rule_set.group_id == crate::WILDCARD_GROUP {
                continue;
            }
            if !self.group_id_exists(&rule_set.group_id) {
                warnings.push(format!(
                    "routing rule set references unknown group {:?}",
                    rule_set.group_id
                ));
            }
        }

        Ok(warnings)
    }

    fn group_id_exists(&self, reference: &str) -> bool {
        self.storages.iter().any(|storage| {
            storage.repositories.iter().any(|repository| {
                repository.is_group()
                    && (repository.id == reference
                        || format!("{}:{}", storage.id, repository.id) == reference)
            })
        })
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Callers are expected to point `storage.root`
    /// and `ledger.path` at temporary locations and fill in a topology.
    pub fn for_testing() -> Self {
        Self {
            cleanup: CleanupConfig {
                enabled: false,
                ..CleanupConfig::default()
            },
            ..Self::default()
        }
    }
}

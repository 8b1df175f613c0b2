//! Repository topology configuration entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Repository type, fixed at configuration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// Authoritative, locally stored content.
    Hosted,
    /// On-demand mirror of a remote origin.
    Proxy,
    /// Ordered aggregation over member repositories.
    Group,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Proxy => "proxy",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version policy enforced on deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryPolicy {
    Release,
    Snapshot,
    #[default]
    Mixed,
}

impl RepositoryPolicy {
    /// Whether an artifact version may be deployed under this policy.
    pub fn accepts_version(&self, version: &str) -> bool {
        let snapshot = version.ends_with("-SNAPSHOT");
        match self {
            Self::Release => !snapshot,
            Self::Snapshot => snapshot,
            Self::Mixed => true,
        }
    }
}

/// Remote origin descriptor for proxy repositories.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteRepository {
    /// Base URL of the origin (http or https).
    pub url: String,
    /// Total fetch attempts for one resource, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Overall wall-clock budget for one fetch, retries included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum pause between consecutive attempts.
    #[serde(default = "default_min_attempt_interval_secs")]
    pub min_attempt_interval_secs: u64,
    /// Age after which cached metadata files are re-validated against the
    /// origin. 0 means metadata is always considered stale.
    #[serde(default = "default_metadata_max_age_secs")]
    pub metadata_max_age_secs: u64,
    /// Connection pool size towards the origin.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_min_attempt_interval_secs() -> u64 {
    5
}

fn default_metadata_max_age_secs() -> u64 {
    300
}

fn default_pool_size() -> u32 {
    8
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl RemoteRepository {
    /// Create a descriptor with default tuning for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            min_attempt_interval_secs: default_min_attempt_interval_secs(),
            metadata_max_age_secs: default_metadata_max_age_secs(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_attempt_interval(&self) -> Duration {
        Duration::from_secs(self.min_attempt_interval_secs)
    }

    pub fn metadata_max_age(&self) -> Duration {
        Duration::from_secs(self.metadata_max_age_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate remote configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(format!("remote url must be http(s): {}", self.url));
        }
        if self.max_attempts == 0 {
            return Err("remote max_attempts must be at least 1".to_string());
        }
        if self.pool_size == 0 {
            return Err("remote pool_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// A single repository inside a storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    #[serde(rename = "type")]
    pub repository_type: RepositoryType,
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default)]
    pub policy: RepositoryPolicy,
    #[serde(default = "default_true")]
    pub allows_deployment: bool,
    #[serde(default)]
    pub allows_redeployment: bool,
    #[serde(default = "default_true")]
    pub allows_delete: bool,
    #[serde(default)]
    pub allows_force_deletion: bool,
    #[serde(default)]
    pub trash_enabled: bool,
    #[serde(default)]
    pub indexing_enabled: bool,
    #[serde(default = "default_true")]
    pub in_service: bool,
    /// Proxy repositories only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteRepository>,
    /// Group repositories only. Members are repository ids within the same
    /// storage, or `storage:repository` to reach across storages. Order is
    /// the fan-out order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

fn default_layout() -> String {
    crate::DEFAULT_LAYOUT.to_string()
}

fn default_true() -> bool {
    true
}

impl Repository {
    /// A hosted repository with default flags.
    pub fn hosted(id: impl Into<String>) -> Self {
        Self::with_type(id, RepositoryType::Hosted)
    }

    /// A proxy repository mirroring the given remote.
    pub fn proxy(id: impl Into<String>, remote: RemoteRepository) -> Self {
        let mut repository = Self::with_type(id, RepositoryType::Proxy);
        repository.remote = Some(remote);
        repository
    }

    /// A group repository over the given members, in fan-out order.
    pub fn group(id: impl Into<String>, members: Vec<String>) -> Self {
        let mut repository = Self::with_type(id, RepositoryType::Group);
        repository.members = members;
        repository
    }

    fn with_type(id: impl Into<String>, repository_type: RepositoryType) -> Self {
        Self {
            id: id.into(),
            repository_type,
            layout: default_layout(),
            policy: RepositoryPolicy::default(),
            allows_deployment: true,
            allows_redeployment: false,
            allows_delete: true,
            allows_force_deletion: false,
            trash_enabled: false,
            indexing_enabled: false,
            in_service: true,
            remote: None,
            members: Vec::new(),
        }
    }

    pub fn is_hosted(&self) -> bool {
        self.repository_type == RepositoryType::Hosted
    }

    pub fn is_proxy(&self) -> bool {
        self.repository_type == RepositoryType::Proxy
    }

    pub fn is_group(&self) -> bool {
        self.repository_type == RepositoryType::Group
    }

    /// Validate per-repository invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("repository id cannot be empty".to_string());
        }
        if self.id.contains([':', '/']) {
            return Err(format!("repository id contains reserved character: {}", self.id));
        }
        match self.repository_type {
            RepositoryType::Proxy => {
                let remote = self
                    .remote
                    .as_ref()
                    .ok_or_else(|| format!("proxy repository {} requires a remote", self.id))?;
                remote.validate()?;
                if !self.members.is_empty() {
                    return Err(format!("proxy repository {} cannot have members", self.id));
                }
            }
            RepositoryType::Group => {
                if self.remote.is_some() {
                    return Err(format!("group repository {} cannot have a remote", self.id));
                }
            }
            RepositoryType::Hosted => {
                if self.remote.is_some() {
                    return Err(format!("hosted repository {} cannot have a remote", self.id));
                }
                if !self.members.is_empty() {
                    return Err(format!("hosted repository {} cannot have members", self.id));
                }
            }
        }
        Ok(())
    }
}

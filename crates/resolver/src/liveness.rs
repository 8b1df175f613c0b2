//! Remote liveness cache.

use crate::transport::RemoteClient;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cached verdict about a remote origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Down,
    /// No verdict, or the cached one aged out.
    Unknown,
}

struct Entry {
    alive: bool,
    at: Instant,
}

/// TTL-bounded verdict cache keyed by remote base URL.
///
/// Only a known-Down verdict triggers fail-fast behavior; Unknown always
/// lets the caller try, so an expired cache degrades to normal operation
/// rather than blocking requests.
pub struct AlivenessCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl AlivenessCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn verdict(&self, url: &str) -> Liveness {
        match self.entries.get(url) {
            Some(entry) if entry.at.elapsed() <= self.ttl => {
                if entry.alive {
                    Liveness::Alive
                } else {
                    Liveness::Down
                }
            }
            _ => Liveness::Unknown,
        }
    }

    pub fn is_known_down(&self, url: &str) -> bool {
        self.verdict(url) == Liveness::Down
    }

    pub fn mark_alive(&self, url: &str) {
        self.entries.insert(
            url.to_string(),
            Entry {
                alive: true,
                at: Instant::now(),
            },
        );
    }

    pub fn mark_down(&self, url: &str) {
        self.entries.insert(
            url.to_string(),
            Entry {
                alive: false,
                at: Instant::now(),
            },
        );
    }

    /// Probe the remote base URL and record the verdict. A 404 on the base
    /// URL still proves the origin answers; only transport-level failure or
    /// a probe timeout counts as down.
    pub async fn probe(
        &self,
        client: &dyn RemoteClient,
        url: &str,
        probe_timeout: Duration,
    ) -> bool {
        let alive = matches!(
            tokio::time::timeout(probe_timeout, client.head(url)).await,
            Ok(Ok(_))
        );
        debug!(url, alive, "liveness probe");
        if alive {
            self.mark_alive(url);
        } else {
            self.mark_down(url);
        }
        alive
    }
}

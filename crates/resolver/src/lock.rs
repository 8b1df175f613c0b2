//! Per-path read/write locks.

use crate::error::{ResolveError, ResolveResult};
use dashmap::DashMap;
use depot_core::RepositoryPath;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Concurrent table of per-path RwLocks keyed by canonical path.
///
/// Entries are permanent once created; cardinality is bounded by the number
/// of distinct artifact paths. Different paths never contend. All waits are
/// bounded and fail with [`ResolveError::LockTimeout`] on expiry.
pub struct PathLockTable {
    locks: DashMap<String, Arc<RwLock<()>>>,
    timeout: Duration,
}

impl PathLockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    fn entry(&self, key: &str) -> Arc<RwLock<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Acquire shared access to a path.
    pub async fn read(&self, path: &RepositoryPath) -> ResolveResult<OwnedRwLockReadGuard<()>> {
        let key = path.canonical_key();
        let lock = self.entry(&key);
        tokio::time::timeout(self.timeout, lock.read_owned())
            .await
            .map_err(|_| ResolveError::LockTimeout(key))
    }

    /// Acquire exclusive access to a path.
    pub async fn write(&self, path: &RepositoryPath) -> ResolveResult<OwnedRwLockWriteGuard<()>> {
        let key = path.canonical_key();
        let lock = self.entry(&key);
        tokio::time::timeout(self.timeout, lock.write_owned())
            .await
            .map_err(|_| ResolveError::LockTimeout(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(rel: &str) -> RepositoryPath {
        RepositoryPath::new("storage0", "releases", rel).unwrap()
    }

    #[tokio::test]
    async fn test_reads_are_concurrent() {
        let table = PathLockTable::new(Duration::from_secs(1));
        let p = path("a.jar");
        let _r1 = table.read(&p).await.unwrap();
        let _r2 = table.read(&p).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_excludes_read_until_timeout() {
        let table = PathLockTable::new(Duration::from_secs(1));
        let p = path("a.jar");
        let _w = table.write(&p).await.unwrap();
        let err = table.read(&p).await.unwrap_err();
        assert!(matches!(err, ResolveError::LockTimeout(_)));
    }

    #[tokio::test]
    async fn test_different_paths_do_not_contend() {
        let table = PathLockTable::new(Duration::from_secs(1));
        let _w1 = table.write(&path("a.jar")).await.unwrap();
        let _w2 = table.write(&path("b.jar")).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_released_allows_next_writer() {
        let table = PathLockTable::new(Duration::from_secs(1));
        let p = path("a.jar");
        drop(table.write(&p).await.unwrap());
        let _w = table.write(&p).await.unwrap();
    }
}

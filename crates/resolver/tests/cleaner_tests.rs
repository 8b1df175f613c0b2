//! Eviction sweeps over expired proxied content.

mod common;

use bytes::Bytes;
use common::{Harness, ORIGIN, rpath, standard_topology};
use depot_metadata::ArtifactRecordRow;
use depot_resolver::ExpiredArtifactCleaner;
use std::time::Duration;
use time::OffsetDateTime;

const OLD_JAR: &str = "com/acme/app/1.0/app-1.0.jar";
const SMALL_JAR: &str = "com/acme/tiny/1.0/tiny-1.0.jar";
const FRESH_JAR: &str = "com/acme/app/2.0/app-2.0.jar";
const METADATA: &str = "com/acme/app/maven-metadata.xml";

fn record(repository: &str, path: &str, size: i64, days_old: i64) -> ArtifactRecordRow {
    let instant = OffsetDateTime::now_utc() - time::Duration::days(days_old);
    ArtifactRecordRow {
        storage_id: "storage0".to_string(),
        repository_id: repository.to_string(),
        path: path.to_string(),
        size_bytes: Some(size),
        last_updated: instant,
        last_used: instant,
        download_count: 0,
        coordinates: None,
        tags: None,
    }
}

async fn seed(harness: &Harness, repository: &str, path: &str, size: i64, days_old: i64) {
    harness
        .records
        .upsert_stored(&record(repository, path, size, days_old))
        .await
        .unwrap();
    harness
        .store
        .put_bytes(
            &rpath("storage0", repository, path),
            Bytes::from(vec![0u8; size as usize]),
        )
        .await
        .unwrap();
}

fn cleaner(harness: &Harness) -> ExpiredArtifactCleaner {
    ExpiredArtifactCleaner::new(harness.resolver.state(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_evicts_only_old_and_large_artifacts() {
    let harness = Harness::new(standard_topology()).await;
    harness.liveness.mark_alive(ORIGIN);

    seed(&harness, "central", OLD_JAR, 5_000, 40).await;
    seed(&harness, "central", SMALL_JAR, 10, 40).await;
    seed(&harness, "central", FRESH_JAR, 5_000, 1).await;

    let stats = cleaner(&harness).cleanup(30, 1_000).await.unwrap();
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.skipped_repositories, 0);

    let old = rpath("storage0", "central", OLD_JAR);
    assert!(!harness.store.exists(&old).await.unwrap());
    assert!(!harness.records.record_exists(&old).await.unwrap());

    for kept in [SMALL_JAR, FRESH_JAR] {
        let path = rpath("storage0", "central", kept);
        assert!(harness.store.exists(&path).await.unwrap(), "{kept} evicted");
        assert!(harness.records.record_exists(&path).await.unwrap());
    }
}

#[tokio::test]
async fn test_metadata_is_never_evicted() {
    let harness = Harness::new(standard_topology()).await;
    harness.liveness.mark_alive(ORIGIN);
    seed(&harness, "central", METADATA, 5_000, 400).await;

    let stats = cleaner(&harness).cleanup(30, 0).await.unwrap();
    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.examined, 1);

    let path = rpath("storage0", "central", METADATA);
    assert!(harness.store.exists(&path).await.unwrap());
}

#[tokio::test]
async fn test_hosted_content_is_out_of_scope() {
    let harness = Harness::new(standard_topology()).await;
    harness.liveness.mark_alive(ORIGIN);
    seed(&harness, "releases", OLD_JAR, 5_000, 400).await;

    let stats = cleaner(&harness).cleanup(30, 0).await.unwrap();
    assert_eq!(stats.examined, 0);
    assert!(
        harness
            .store
            .exists(&rpath("storage0", "releases", OLD_JAR))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_down_remote_skips_whole_repository() {
    let harness = Harness::new(standard_topology()).await;
    harness.liveness.mark_down(ORIGIN);
    seed(&harness, "central", OLD_JAR, 5_000, 40).await;

    let stats = cleaner(&harness).cleanup(30, 0).await.unwrap();
    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.skipped_repositories, 1);
    assert!(
        harness
            .store
            .exists(&rpath("storage0", "central", OLD_JAR))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_unknown_liveness_probes_before_evicting() {
    let harness = Harness::new(standard_topology()).await;
    seed(&harness, "central", OLD_JAR, 5_000, 40).await;

    // No verdict cached; the sweep probes the origin first. A responsive
    // origin (even a 404 on the base URL) counts as alive.
    let stats = cleaner(&harness).cleanup(30, 0).await.unwrap();
    assert_eq!(harness.remote.head_calls(), 1);
    assert_eq!(stats.deleted, 1);
}

#[tokio::test]
async fn test_unreachable_origin_probe_skips_repository() {
    let harness = Harness::new(standard_topology()).await;
    harness.remote.set_down(true);
    seed(&harness, "central", OLD_JAR, 5_000, 40).await;

    let stats = cleaner(&harness).cleanup(30, 0).await.unwrap();
    assert_eq!(stats.skipped_repositories, 1);
    assert!(
        harness
            .store
            .exists(&rpath("storage0", "central", OLD_JAR))
            .await
            .unwrap()
    );
}

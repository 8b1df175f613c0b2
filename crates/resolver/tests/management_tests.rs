//! Deploy and delete operations with repository policy enforcement.

mod common;

use bytes::Bytes;
use common::{Harness, read_all, rpath, standard_topology};
use depot_core::{Repository, RepositoryPolicy, Storage};
use depot_metadata::TAG_LAST_VERSION;
use depot_resolver::{ArtifactManagementService, ResolveError};

const JAR_10: &str = "com/acme/app/1.0/app-1.0.jar";
const JAR_11: &str = "com/acme/app/1.1/app-1.1.jar";

fn service(harness: &Harness) -> ArtifactManagementService {
    ArtifactManagementService::new(harness.resolver.state())
}

fn topology(mutate: impl FnOnce(&mut Repository)) -> Vec<Storage> {
    let mut storages = standard_topology();
    mutate(
        storages[0]
            .repositories
            .iter_mut()
            .find(|r| r.id == "releases")
            .unwrap(),
    );
    storages
}

#[tokio::test]
async fn test_deploy_then_fetch_roundtrip() {
    let harness = Harness::new(standard_topology()).await;
    let body = Bytes::from_static(b"deployed artifact");
    let path = rpath("storage0", "releases", JAR_10);

    let written = service(&harness).store_bytes(&path, body.clone()).await.unwrap();
    assert_eq!(written, body.len() as u64);

    let stream = harness.resolver.open_stream(&path).await.unwrap().unwrap();
    assert_eq!(read_all(stream).await, body.as_ref());

    let record = harness.records.get_record(&path).await.unwrap().unwrap();
    assert_eq!(record.size_bytes, Some(body.len() as i64));
    assert_eq!(record.coordinates_map().get("version").unwrap(), "1.0");
}

#[tokio::test]
async fn test_deploy_to_group_is_rejected() {
    let harness = Harness::new(standard_topology()).await;
    let path = rpath("storage0", "public", JAR_10);

    let err = service(&harness)
        .store_bytes(&path, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::PolicyViolation(_)));
    assert!(!harness.store.exists(&path).await.unwrap());
}

#[tokio::test]
async fn test_deploy_disallowed_by_flag() {
    let harness = Harness::new(topology(|r| r.allows_deployment = false)).await;
    let path = rpath("storage0", "releases", JAR_10);

    let err = service(&harness)
        .store_bytes(&path, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::PolicyViolation(_)));
    assert!(!harness.store.exists(&path).await.unwrap());
    assert!(!harness.records.record_exists(&path).await.unwrap());
}

#[tokio::test]
async fn test_release_policy_rejects_snapshot_version() {
    let harness = Harness::new(topology(|r| r.policy = RepositoryPolicy::Release)).await;
    let snapshot = rpath(
        "storage0",
        "releases",
        "com/acme/app/1.0-SNAPSHOT/app-1.0-SNAPSHOT.jar",
    );

    let err = service(&harness)
        .store_bytes(&snapshot, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::PolicyViolation(_)));
    assert!(!harness.store.exists(&snapshot).await.unwrap());

    // Release versions still deploy.
    let release = rpath("storage0", "releases", JAR_10);
    service(&harness)
        .store_bytes(&release, Bytes::from_static(b"x"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_redeploy_requires_flag() {
    let harness = Harness::new(standard_topology()).await;
    let path = rpath("storage0", "releases", JAR_10);
    let svc = service(&harness);
    svc.store_bytes(&path, Bytes::from_static(b"v1")).await.unwrap();

    let err = svc
        .store_bytes(&path, Bytes::from_static(b"v2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::PolicyViolation(_)));

    // The original content is untouched.
    let bytes = harness.store.read_bytes(&path).await.unwrap().unwrap();
    assert_eq!(bytes, Bytes::from_static(b"v1"));
}

#[tokio::test]
async fn test_redeploy_allowed_when_flag_set() {
    let harness = Harness::new(topology(|r| r.allows_redeployment = true)).await;
    let path = rpath("storage0", "releases", JAR_10);
    let svc = service(&harness);
    svc.store_bytes(&path, Bytes::from_static(b"v1")).await.unwrap();
    svc.store_bytes(&path, Bytes::from_static(b"v2")).await.unwrap();

    let bytes = harness.store.read_bytes(&path).await.unwrap().unwrap();
    assert_eq!(bytes, Bytes::from_static(b"v2"));
}

#[tokio::test]
async fn test_checksum_overwrite_is_always_allowed() {
    let harness = Harness::new(standard_topology()).await;
    let checksum = rpath("storage0", "releases", "com/acme/app/1.0/app-1.0.jar.sha1");
    let svc = service(&harness);
    svc.store_bytes(&checksum, Bytes::from_static(b"aaaa")).await.unwrap();
    svc.store_bytes(&checksum, Bytes::from_static(b"bbbb")).await.unwrap();

    let bytes = harness.store.read_bytes(&checksum).await.unwrap().unwrap();
    assert_eq!(bytes, Bytes::from_static(b"bbbb"));
}

#[tokio::test]
async fn test_delete_removes_content_and_record() {
    let harness = Harness::new(standard_topology()).await;
    let path = rpath("storage0", "releases", JAR_10);
    let svc = service(&harness);
    svc.store_bytes(&path, Bytes::from_static(b"x")).await.unwrap();

    assert!(svc.delete(&path, false).await.unwrap());
    assert!(!harness.store.exists(&path).await.unwrap());
    assert!(!harness.records.record_exists(&path).await.unwrap());

    // Deleting again reports that nothing existed.
    assert!(!svc.delete(&path, false).await.unwrap());
}

#[tokio::test]
async fn test_trash_enabled_delete_hides_but_keeps_content() {
    let harness = Harness::new(topology(|r| r.trash_enabled = true)).await;
    let path = rpath("storage0", "releases", JAR_10);
    let svc = service(&harness);
    svc.store_bytes(&path, Bytes::from_static(b"x")).await.unwrap();

    assert!(svc.delete(&path, false).await.unwrap());
    // Gone from the canonical location and from the ledger.
    assert!(!harness.store.exists(&path).await.unwrap());
    assert!(!harness.records.record_exists(&path).await.unwrap());
    assert!(harness.resolver.open_stream(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn test_force_delete_still_goes_through_trash() {
    let harness = Harness::new(topology(|r| {
        r.trash_enabled = true;
        r.allows_force_deletion = true;
    }))
    .await;
    let path = rpath("storage0", "releases", JAR_10);
    let svc = service(&harness);
    svc.store_bytes(&path, Bytes::from_static(b"x")).await.unwrap();

    assert!(svc.delete(&path, true).await.unwrap());
    assert!(!harness.store.exists(&path).await.unwrap());
    assert!(!harness.records.record_exists(&path).await.unwrap());

    // Force deletion still parks the content under .trash, not a hard erase.
    let trashed = harness
        .root
        .path()
        .join("storage0/releases/.trash")
        .join(JAR_10);
    assert!(trashed.is_file());
}

#[tokio::test]
async fn test_delete_disallowed_by_flag() {
    let harness = Harness::new(topology(|r| r.allows_delete = false)).await;
    let path = rpath("storage0", "releases", JAR_10);
    // Bypass the service to place content, then try to delete it.
    harness
        .store
        .put_bytes(&path, Bytes::from_static(b"x"))
        .await
        .unwrap();

    let err = service(&harness).delete(&path, false).await.unwrap_err();
    assert!(matches!(err, ResolveError::PolicyViolation(_)));
    assert!(harness.store.exists(&path).await.unwrap());
}

#[tokio::test]
async fn test_force_delete_requires_flag() {
    let harness = Harness::new(standard_topology()).await;
    let path = rpath("storage0", "releases", JAR_10);
    let svc = service(&harness);
    svc.store_bytes(&path, Bytes::from_static(b"x")).await.unwrap();

    let err = svc.delete(&path, true).await.unwrap_err();
    assert!(matches!(err, ResolveError::PolicyViolation(_)));

    let harness = Harness::new(topology(|r| r.allows_force_deletion = true)).await;
    let svc = service(&harness);
    svc.store_bytes(&path, Bytes::from_static(b"x")).await.unwrap();
    assert!(svc.delete(&path, true).await.unwrap());
}

#[tokio::test]
async fn test_last_version_tag_follows_newest_deploy() {
    let harness = Harness::new(standard_topology()).await;
    let svc = service(&harness);
    let v10 = rpath("storage0", "releases", JAR_10);
    let v11 = rpath("storage0", "releases", JAR_11);

    svc.store_bytes(&v10, Bytes::from_static(b"v1.0")).await.unwrap();
    let record = harness.records.get_record(&v10).await.unwrap().unwrap();
    assert!(record.has_tag(TAG_LAST_VERSION));

    svc.store_bytes(&v11, Bytes::from_static(b"v1.1")).await.unwrap();
    let newer = harness.records.get_record(&v11).await.unwrap().unwrap();
    assert!(newer.has_tag(TAG_LAST_VERSION));
    let older = harness.records.get_record(&v10).await.unwrap().unwrap();
    assert!(!older.has_tag(TAG_LAST_VERSION));
}

#[tokio::test]
async fn test_deploying_older_version_does_not_steal_tag() {
    let harness = Harness::new(standard_topology()).await;
    let svc = service(&harness);
    let v10 = rpath("storage0", "releases", JAR_10);
    let v11 = rpath("storage0", "releases", JAR_11);

    svc.store_bytes(&v11, Bytes::from_static(b"v1.1")).await.unwrap();
    svc.store_bytes(&v10, Bytes::from_static(b"v1.0")).await.unwrap();

    let newer = harness.records.get_record(&v11).await.unwrap().unwrap();
    assert!(newer.has_tag(TAG_LAST_VERSION));
    let older = harness.records.get_record(&v10).await.unwrap().unwrap();
    assert!(!older.has_tag(TAG_LAST_VERSION));
}

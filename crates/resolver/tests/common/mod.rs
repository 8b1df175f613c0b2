//! Shared fixtures for resolver integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{
    AppConfig, RemoteRepository, RepoKey, Repository, RepositoryIndex, RepositoryPath, Storage,
};
use depot_metadata::{MetadataStore, SqliteStore};
use depot_resolver::{
    AlivenessCache, BodyStream, RemoteClient, RemoteHead, ResolveError, ResolveResult, Resolver,
    join_url,
};
use depot_storage::{ArtifactStore, ByteStream};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

pub const ORIGIN: &str = "https://origin.example/m2";

pub fn origin_url(relative: &str) -> String {
    join_url(ORIGIN, relative)
}

struct MockResource {
    body: Bytes,
    accept_ranges: bool,
    /// Bytes served before a simulated connection break.
    break_after: usize,
    /// How many more streams (initial or ranged) should break.
    breaks_remaining: usize,
}

impl MockResource {
    fn next_stream(&mut self, start: usize) -> BodyStream {
        let tail = self.body.slice(start.min(self.body.len())..);
        let mut chunks: Vec<std::io::Result<Bytes>> = Vec::new();
        if self.breaks_remaining > 0 {
            self.breaks_remaining -= 1;
            let cut = self.break_after.min(tail.len());
            if cut > 0 {
                chunks.push(Ok(tail.slice(..cut)));
            }
            chunks.push(Err(std::io::Error::other("connection reset by origin")));
        } else {
            for chunk in tail.chunks(1024) {
                chunks.push(Ok(Bytes::copy_from_slice(chunk)));
            }
        }
        Box::pin(futures::stream::iter(chunks))
    }
}

/// Programmable in-process origin. Resources are keyed by full URL; stream
/// breaks happen at exact byte offsets, which an httpmock origin cannot do.
#[derive(Default)]
pub struct MockRemote {
    resources: Mutex<HashMap<String, MockResource>>,
    down: AtomicBool,
    pub head_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub range_calls: AtomicUsize,
}

impl MockRemote {
    pub fn put(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.insert(url.into(), body.into(), true);
    }

    pub fn put_no_ranges(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.insert(url.into(), body.into(), false);
    }

    fn insert(&self, url: String, body: Bytes, accept_ranges: bool) {
        self.resources.lock().unwrap().insert(
            url,
            MockResource {
                body,
                accept_ranges,
                break_after: 0,
                breaks_remaining: 0,
            },
        );
    }

    /// Make the next `times` streams for this resource break after
    /// `break_after` bytes.
    pub fn break_streams(&self, url: &str, break_after: usize, times: usize) {
        let mut resources = self.resources.lock().unwrap();
        let resource = resources.get_mut(url).expect("resource not registered");
        resource.break_after = break_after;
        resource.breaks_remaining = times;
    }

    /// Delete a resource from the origin.
    pub fn remove(&self, url: &str) {
        self.resources.lock().unwrap().remove(url);
    }

    /// Simulate the whole origin being unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> ResolveResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ResolveError::RemoteUnavailable(
                "origin unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn head(&self, url: &str) -> ResolveResult<Option<RemoteHead>> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let resources = self.resources.lock().unwrap();
        Ok(resources.get(url).map(|resource| RemoteHead {
            accept_ranges: resource.accept_ranges,
            content_length: Some(resource.body.len() as u64),
        }))
    }

    async fn get(&self, url: &str) -> ResolveResult<Option<BodyStream>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let mut resources = self.resources.lock().unwrap();
        let Some(resource) = resources.get_mut(url) else {
            return Ok(None);
        };
        Ok(Some(resource.next_stream(0)))
    }

    async fn get_range(&self, url: &str, start: u64) -> ResolveResult<Option<BodyStream>> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let mut resources = self.resources.lock().unwrap();
        let Some(resource) = resources.get_mut(url) else {
            return Ok(None);
        };
        Ok(Some(resource.next_stream(start as usize)))
    }
}

/// One fully wired resolver over a temp store, an in-memory ledger, and a
/// shared mock origin for every proxy repository.
pub struct Harness {
    pub resolver: Arc<Resolver>,
    pub store: Arc<dyn ArtifactStore>,
    pub records: Arc<dyn MetadataStore>,
    pub remote: Arc<MockRemote>,
    pub liveness: Arc<AlivenessCache>,
    /// Root of the on-disk store, for assertions on physical layout.
    pub root: TempDir,
}

impl Harness {
    pub async fn new(storages: Vec<Storage>) -> Self {
        let mut config = AppConfig::for_testing();
        config.storages = storages;
        Self::with_config(config).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let store = depot_storage::open(root.path()).await.expect("storage");
        let sqlite = SqliteStore::in_memory().await.expect("ledger");
        sqlite.migrate().await.expect("migrate");
        let records: Arc<dyn MetadataStore> = Arc::new(sqlite);

        // Unvalidated: tests exercise runtime guards (cycles included) that
        // config validation would reject up front.
        let index = Arc::new(RepositoryIndex::build_unvalidated(&config.storages));
        let liveness = Arc::new(AlivenessCache::new(config.liveness.ttl()));
        let remote = Arc::new(MockRemote::default());
        let mut transports: HashMap<RepoKey, Arc<dyn RemoteClient>> = HashMap::new();
        for (key, _) in index.proxy_repositories() {
            transports.insert(key.clone(), remote.clone() as Arc<dyn RemoteClient>);
        }

        let resolver = Resolver::with_transports(
            index,
            store.clone(),
            records.clone(),
            &config,
            liveness.clone(),
            transports,
        )
        .expect("resolver");

        Self {
            resolver: Arc::new(resolver),
            store,
            records,
            remote,
            liveness,
            root,
        }
    }
}

/// Hosted "releases", proxy "central" at [`ORIGIN`], group "public" over
/// both, all in "storage0".
pub fn standard_topology() -> Vec<Storage> {
    vec![Storage {
        id: "storage0".to_string(),
        repositories: vec![
            Repository::hosted("releases"),
            Repository::proxy("central", RemoteRepository::new(ORIGIN)),
            Repository::group(
                "public",
                vec!["releases".to_string(), "central".to_string()],
            ),
        ],
    }]
}

pub fn rpath(storage: &str, repository: &str, relative: &str) -> RepositoryPath {
    RepositoryPath::new(storage, repository, relative).expect("valid path")
}

pub async fn read_all(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.expect("stream chunk"));
    }
    out
}

/// Deterministic non-repeating-ish body for byte-exact resume assertions.
pub fn patterned_body(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

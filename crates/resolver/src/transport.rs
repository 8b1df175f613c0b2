//! Remote origin transport.

use crate::error::{ResolveError, ResolveResult};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::RemoteRepository;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, RANGE};
use std::pin::Pin;

/// Body stream produced by a remote GET.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Result of a HEAD probe against an existing remote resource.
#[derive(Clone, Debug)]
pub struct RemoteHead {
    /// Origin advertises `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    pub content_length: Option<u64>,
}

/// Transport towards one remote origin.
///
/// All three operations model a missing resource (404) as `Ok(None)`.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn head(&self, url: &str) -> ResolveResult<Option<RemoteHead>>;

    async fn get(&self, url: &str) -> ResolveResult<Option<BodyStream>>;

    /// GET from a byte offset via `Range: bytes=<start>-`.
    async fn get_range(&self, url: &str, start: u64) -> ResolveResult<Option<BodyStream>>;
}

/// reqwest-backed transport, one client per remote with the remote's pool
/// and connect-timeout tuning.
#[derive(Clone)]
pub struct HttpRemoteClient {
    client: reqwest::Client,
}

impl HttpRemoteClient {
    pub fn new(remote: &RemoteRepository) -> ResolveResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(remote.connect_timeout())
            .pool_max_idle_per_host(remote.pool_size as usize)
            .build()
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

/// Connection-level failures become RemoteUnavailable so callers can update
/// the liveness cache; everything else is a plain transport error.
fn map_reqwest(e: reqwest::Error) -> ResolveError {
    if e.is_connect() || e.is_timeout() {
        ResolveError::RemoteUnavailable(e.to_string())
    } else {
        ResolveError::Transport(e.to_string())
    }
}

fn into_body_stream(response: reqwest::Response) -> BodyStream {
    Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string()))),
    )
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn head(&self, url: &str) -> ResolveResult<Option<RemoteHead>> {
        let response = self.client.head(url).send().await.map_err(map_reqwest)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let accept_ranges = response
                    .headers()
                    .get(ACCEPT_RANGES)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));
                Ok(Some(RemoteHead {
                    accept_ranges,
                    content_length: response.content_length(),
                }))
            }
            status => Err(ResolveError::Transport(format!(
                "unexpected status {status} from HEAD {url}"
            ))),
        }
    }

    async fn get(&self, url: &str) -> ResolveResult<Option<BodyStream>> {
        let response = self.client.get(url).send().await.map_err(map_reqwest)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(into_body_stream(response))),
            status => Err(ResolveError::Transport(format!(
                "unexpected status {status} from GET {url}"
            ))),
        }
    }

    async fn get_range(&self, url: &str, start: u64) -> ResolveResult<Option<BodyStream>> {
        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={start}-"))
            .send()
            .await
            .map_err(map_reqwest)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::PARTIAL_CONTENT => Ok(Some(into_body_stream(response))),
            status if status.is_success() => Err(ResolveError::Transport(format!(
                "origin ignored range request at {url} (status {status})"
            ))),
            status => Err(ResolveError::Transport(format!(
                "unexpected status {status} from ranged GET {url}"
            ))),
        }
    }
}

/// Join a remote base URL and a repository-relative path.
pub fn join_url(base: &str, relative_path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), relative_path)
}

//! Remote fetch engine with range-resume retry.

use crate::error::{ResolveError, ResolveResult};
use crate::transport::RemoteClient;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::RemoteRepository;
use depot_storage::{StorageResult, StreamingWrite};
use futures::StreamExt;
use tracing::{debug, instrument, warn};

/// Streams one remote resource into a sink.
///
/// Retries after a mid-stream failure only when the origin advertised range
/// support; a blind retry on a range-incapable origin would restart at byte
/// zero and corrupt the already-written prefix. Retries resume with
/// `Range: bytes=<written>-` and append to the sink. Sleeps go through the
/// tokio clock, so tests run under `start_paused`.
pub struct RemoteFetchEngine;

impl RemoteFetchEngine {
    /// Fetch `url` into `sink`. Returns `Ok(None)` when the origin reports
    /// the resource missing, `Ok(Some(bytes_written))` on success.
    ///
    /// The sink is left unpublished in all cases; the caller finishes or
    /// aborts it.
    #[instrument(skip(client, remote, sink, url), fields(url = %url))]
    pub async fn fetch(
        client: &dyn RemoteClient,
        remote: &RemoteRepository,
        url: &str,
        sink: &mut dyn StreamingWrite,
    ) -> ResolveResult<Option<u64>> {
        let Some(head) = client.head(url).await? else {
            return Ok(None);
        };

        let deadline = tokio::time::Instant::now() + remote.timeout();
        let mut stream = match client.get(url).await? {
            Some(stream) => stream,
            None => return Ok(None),
        };

        let mut written: u64 = 0;
        let mut attempt: u32 = 1;
        loop {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    written += chunk.len() as u64;
                    sink.write(chunk).await?;
                }
                Some(Err(err)) => {
                    if !head.accept_ranges {
                        return Err(ResolveError::Transport(format!(
                            "stream broke after {written} bytes and origin does not \
                             support ranges: {err}"
                        )));
                    }
                    if attempt >= remote.max_attempts {
                        return Err(ResolveError::Transport(err.to_string()));
                    }
                    tokio::time::sleep(remote.min_attempt_interval()).await;
                    if tokio::time::Instant::now() >= deadline {
                        warn!(url, written, "fetch budget exhausted during retry wait");
                        return Err(ResolveError::Transport(err.to_string()));
                    }
                    attempt += 1;
                    debug!(url, written, attempt, "resuming fetch from byte offset");
                    stream = match client.get_range(url, written).await? {
                        Some(stream) => stream,
                        None => {
                            return Err(ResolveError::Transport(format!(
                                "resource disappeared during ranged retry of {url}"
                            )));
                        }
                    };
                }
                None => return Ok(Some(written)),
            }
        }
    }
}

/// In-memory sink for fetches that need post-processing before publication
/// (metadata merging).
#[derive(Default)]
pub struct BufferWrite {
    buf: Vec<u8>,
}

impl BufferWrite {
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

#[async_trait]
impl StreamingWrite for BufferWrite {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.buf.extend_from_slice(&data);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        Ok(self.buf.len() as u64)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

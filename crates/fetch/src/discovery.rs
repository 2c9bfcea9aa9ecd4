//! Block identifier discovery.
//!
//! A single task produces the ordered stream of block identifiers feeding
//! the download pool, using one of two strategies:
//!
//! - **Index files**: search for the index object covering the current
//!   ledger height, stream its packed identifiers, and walk forward one
//!   index object at a time.
//! - **Direct search**: query block objects by a numeric height attribute,
//!   one batch-sized range per round.
//!
//! Discovery reads the ledger height once at start. Resumption is
//! batch-aligned: the first index object is read from the height's ordinal
//! and its leading identifiers are skipped; direct search starts its first
//! range at the height itself.

use crate::{
    error::{FetchError, FetchResult},
    service::StopHandle,
};
use blockfetch_store::{ObjectStore, SearchQuery, StoreError, StoreResult};
use blockfetch_types::{Oid, OID_SIZE};
use std::{future::Future, io, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
    time::{timeout_at, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Outcome of streaming one index object.
enum Flow {
    /// The object was fully consumed; move to the next one.
    Continue,
    /// The stop barrier fired mid-stream; discovery is done.
    Stopped,
}

/// The discovery task.
pub(crate) struct Discoverer<S> {
    pub(crate) store: Arc<S>,
    pub(crate) timeout: Duration,
    pub(crate) oid_batch_size: usize,
    pub(crate) index_file_size: u32,
    pub(crate) index_file_attribute: String,
    pub(crate) block_attribute: String,
    pub(crate) skip_index_files_search: bool,
    pub(crate) height: u32,
    pub(crate) oids: mpsc::Sender<Oid>,
    pub(crate) stop: CancellationToken,
    pub(crate) root: CancellationToken,
}

impl<S: ObjectStore> Discoverer<S> {
    /// Run the configured strategy, then request service teardown: forced
    /// on error, unforced when the archive is exhausted.
    pub(crate) async fn run(self, service_stop: StopHandle) {
        let result = if self.skip_index_files_search {
            self.fetch_oids_by_search().await
        } else {
            self.fetch_oids_from_index_files().await
        };
        let force = match result {
            Ok(()) => false,
            Err(err) => {
                error!(error = %err, "block identifier discovery failed");
                true
            }
        };
        // Nothing left to discover: wind the service down.
        service_stop.stop(force);
    }

    /// Discover identifiers by walking index objects.
    async fn fetch_oids_from_index_files(&self) -> FetchResult<()> {
        let mut start_index = self.height / self.index_file_size;
        let mut skip = self.height % self.index_file_size;

        loop {
            if self.stop.is_cancelled() {
                return Ok(());
            }

            let query = SearchQuery::new()
                .string_equal(self.index_file_attribute.as_str(), start_index.to_string());
            let deadline = Instant::now() + self.timeout;
            let found = match self.bounded(deadline, self.store.search(query)).await {
                Ok(found) => found,
                Err(err) if err.is_cancellation() => return Ok(()),
                Err(err) => {
                    return Err(FetchError::IndexSearch {
                        attribute: self.index_file_attribute.clone(),
                        index: start_index,
                        source: err,
                    })
                }
            };
            let Some(first) = found.first().copied() else {
                info!(
                    attribute = %self.index_file_attribute,
                    index = start_index,
                    "no index object found, stopping",
                );
                return Ok(());
            };

            // One deadline covers opening the index object and streaming
            // its identifiers.
            let deadline = Instant::now() + self.timeout;
            let reader = match self.bounded(deadline, self.store.get(first)).await {
                Ok(reader) => reader,
                Err(err) if err.is_cancellation() => return Ok(()),
                Err(err) => {
                    return Err(FetchError::IndexFetch {
                        attribute: self.index_file_attribute.clone(),
                        index: start_index,
                        source: err,
                    })
                }
            };

            match self.stream_oids(reader, deadline, start_index, skip).await? {
                Flow::Continue => {}
                Flow::Stopped => return Ok(()),
            }

            start_index += 1;
            skip = 0;
        }
    }

    /// Stream the packed identifiers of one index object into the
    /// identifier channel, discarding the first `skip` of them.
    ///
    /// The object is read in fixed 32-byte units and never buffered whole.
    /// A partial trailing identifier is fatal, as is a total count that
    /// differs from the configured index file size.
    async fn stream_oids(
        &self,
        mut reader: S::Object,
        deadline: Instant,
        index: u32,
        skip: u32,
    ) -> FetchResult<Flow> {
        let mut buf = [0u8; OID_SIZE];
        let mut processed: u32 = 0;

        loop {
            let n = tokio::select! {
                _ = self.root.cancelled() => return Ok(Flow::Stopped),
                res = timeout_at(deadline, read_full(&mut reader, &mut buf)) => match res {
                    Ok(Ok(n)) => n,
                    Ok(Err(err)) => return Err(FetchError::OidStream { index, source: err }),
                    Err(_) => {
                        return Err(FetchError::OidStream {
                            index,
                            source: io::Error::new(
                                io::ErrorKind::TimedOut,
                                "identifier stream read deadline exceeded",
                            ),
                        })
                    }
                },
            };
            if n == 0 {
                break;
            }
            if n < OID_SIZE {
                return Err(FetchError::OidStream {
                    index,
                    source: io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "partial identifier at end of object",
                    ),
                });
            }

            if processed < skip {
                processed += 1;
                continue;
            }

            let id = Oid::new(buf);
            tokio::select! {
                _ = self.stop.cancelled() => return Ok(Flow::Stopped),
                res = self.oids.send(id) => {
                    // The receiver only disappears during teardown.
                    if res.is_err() {
                        return Ok(Flow::Stopped);
                    }
                }
            }
            processed += 1;
        }

        if processed != self.index_file_size {
            return Err(FetchError::OidCountMismatch {
                index,
                expected: self.index_file_size,
                actual: processed,
            });
        }
        Ok(Flow::Continue)
    }

    /// Discover identifiers by range-searching block objects directly.
    ///
    /// Identifiers are emitted in the order the store returns them; the
    /// numeric range search is expected to be ordered by ascending
    /// attribute value.
    async fn fetch_oids_by_search(&self) -> FetchResult<()> {
        let batch = self.oid_batch_size as u32;
        let mut start_index = self.height;

        loop {
            if self.stop.is_cancelled() {
                return Ok(());
            }

            let upper = start_index.saturating_add(batch - 1);
            let query = SearchQuery::new()
                .num_ge(self.block_attribute.as_str(), u64::from(start_index))
                .num_le(self.block_attribute.as_str(), u64::from(upper));
            let deadline = Instant::now() + self.timeout;
            let found = match self.bounded(deadline, self.store.search(query)).await {
                Ok(found) => found,
                Err(err) if err.is_cancellation() => return Ok(()),
                Err(err) => {
                    return Err(FetchError::BlockSearch { index: start_index, source: err })
                }
            };
            if found.is_empty() {
                info!(
                    attribute = %self.block_attribute,
                    index = start_index,
                    "no block object found, stopping",
                );
                return Ok(());
            }

            for id in found {
                tokio::select! {
                    _ = self.stop.cancelled() => return Ok(()),
                    res = self.oids.send(id) => {
                        if res.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            start_index = start_index.saturating_add(batch);
        }
    }

    /// Run one store request under the per-request deadline, aborting when
    /// the root token fires.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        tokio::select! {
            _ = self.root.cancelled() => Err(StoreError::Cancelled),
            res = timeout_at(deadline, fut) => match res {
                Ok(res) => res,
                Err(_) => Err(StoreError::Timeout),
            },
        }
    }
}

/// Fill `buf` from the reader, tolerating short reads.
///
/// Returns the number of bytes read: `buf.len()` normally, less than that
/// only when the stream ended, `0` on a clean end exactly at an identifier
/// boundary.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

//! The block download pool.
//!
//! A fixed number of identical workers share the identifier channel. Each
//! worker fetches the object behind an identifier, decodes it into a block,
//! and forwards it downstream. Workers preserve no per-identifier ordering;
//! blocks reach the block channel in completion order.

use crate::service::StopHandle;
use blockfetch_store::ObjectStore;
use blockfetch_types::{Block, Oid};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, Mutex},
    time::{timeout_at, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// One download worker.
///
/// Exits when the identifier channel closes, when the root token fires, or
/// after escalating a download or decode failure.
pub(crate) struct Downloader<S> {
    pub(crate) store: Arc<S>,
    pub(crate) timeout: Duration,
    pub(crate) state_root_in_header: bool,
    pub(crate) oids: Arc<Mutex<mpsc::Receiver<Oid>>>,
    pub(crate) blocks: mpsc::Sender<Block>,
    pub(crate) root: CancellationToken,
    pub(crate) stop: StopHandle,
}

impl<S: ObjectStore> Downloader<S> {
    pub(crate) async fn run(self) {
        loop {
            let id = {
                let mut oids = self.oids.lock().await;
                oids.recv().await
            };
            // Channel closed: no more identifiers are coming.
            let Some(id) = id else { return };

            // One deadline covers the object fetch and the decode.
            let deadline = Instant::now() + self.timeout;

            let mut reader = tokio::select! {
                _ = self.root.cancelled() => return,
                res = timeout_at(deadline, self.store.get(id)) => match res {
                    Ok(Ok(reader)) => reader,
                    Ok(Err(err)) if err.is_cancellation() => return,
                    Ok(Err(err)) => {
                        error!(oid = %id, error = %err, "failed to fetch block object");
                        self.stop.stop(true);
                        return;
                    }
                    Err(_) => {
                        error!(oid = %id, "block object fetch deadline exceeded");
                        self.stop.stop(true);
                        return;
                    }
                },
            };

            let block = tokio::select! {
                _ = self.root.cancelled() => return,
                res = timeout_at(
                    deadline,
                    Block::decode(&mut reader, self.state_root_in_header),
                ) => match res {
                    Ok(Ok(block)) => block,
                    Ok(Err(err)) => {
                        error!(oid = %id, error = %err, "failed to decode block from stream");
                        self.stop.stop(true);
                        return;
                    }
                    Err(_) => {
                        error!(oid = %id, "block decode deadline exceeded");
                        self.stop.stop(true);
                        return;
                    }
                },
            };
            drop(reader);

            tokio::select! {
                _ = self.root.cancelled() => return,
                res = self.blocks.send(block) => {
                    // The receiver only disappears during teardown.
                    if res.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

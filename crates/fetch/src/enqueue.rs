//! The ordered enqueuer.
//!
//! A single task drains the block channel and hands each block to the
//! sink. It is the only caller of [`BlockSink::enqueue`], so at most one
//! enqueue is in flight at any instant; delivery order equals block-channel
//! arrival order.

use crate::{ledger::BlockSink, service::StopHandle};
use blockfetch_types::Block;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// The enqueue task.
///
/// Exits when the block channel closes, when the root token fires, or
/// after escalating a rejected block.
pub(crate) struct Enqueuer<Q> {
    pub(crate) sink: Arc<Q>,
    pub(crate) blocks: mpsc::Receiver<Block>,
    pub(crate) root: CancellationToken,
    pub(crate) stop: StopHandle,
}

impl<Q: BlockSink> Enqueuer<Q> {
    pub(crate) async fn run(mut self) {
        while let Some(block) = self.blocks.recv().await {
            if self.root.is_cancelled() {
                return;
            }
            let index = block.index;
            if let Err(err) = self.sink.enqueue(block).await {
                error!(index, error = %err, "failed to enqueue block");
                self.stop.stop(true);
                return;
            }
        }
    }
}

//! External collaborator interfaces: the ledger and the block sink.

use blockfetch_types::Block;
use std::future::Future;

/// Chain properties the fetch service needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainInfo {
    /// Whether block headers commit a state root. Threaded into the block
    /// decoder.
    pub state_root_in_header: bool,
}

/// The subset of the blockchain the service talks to.
///
/// Both methods are read exactly once: `chain_info` at construction and
/// `block_height` when discovery starts. The service never polls the ledger
/// afterwards; restart behavior relies entirely on `block_height` reflecting
/// the ledger's persisted progress.
pub trait Ledger: Send + Sync + 'static {
    /// Chain configuration.
    fn chain_info(&self) -> ChainInfo;

    /// Current ledger height.
    fn block_height(&self) -> u32;
}

/// Downstream consumer of fetched blocks.
///
/// The service calls `enqueue` serially, one block at a time, in
/// block-channel arrival order. An error rejects the block and tears the
/// service down; no further blocks are submitted after a rejection.
pub trait BlockSink: Send + Sync + 'static {
    /// Error reported for a rejected block.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Hand one block to the consumer.
    fn enqueue(&self, block: Block) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

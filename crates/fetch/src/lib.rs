//! Block-fetching service.
//!
//! Catches a chain node up from an archived block history held in a
//! content-addressed object store, faster than peer-to-peer gossip would
//! allow. The service discovers block object identifiers, downloads and
//! decodes the objects in parallel, and hands the blocks to a downstream
//! queue in discovery order.
//!
//! # Architecture
//!
//! The service is a three-stage pipeline over bounded channels, supervised
//! by an exiter task:
//!
//! - **Discovery** produces block identifiers, either by walking index
//!   objects (packed arrays of identifiers) or by range-searching block
//!   objects on a numeric height attribute.
//! - **Download pool**: a fixed number of workers fetch and decode objects
//!   in parallel.
//! - **Enqueuer**: a single task hands decoded blocks to the
//!   [`BlockSink`], one at a time.
//!
//! Any task observing a fatal condition requests a forced teardown; normal
//! exhaustion of the archive requests an unforced one. The exiter
//! serializes teardown, cancels in-flight reads when forced, drains the
//! stages in pipeline order, releases the store client, and fires the
//! shutdown callback exactly once.
//!
//! # Example
//!
//! ```ignore
//! use blockfetch::{FetcherConfig, Service};
//!
//! let cfg = FetcherConfig {
//!     container_id: "archive".into(),
//!     addresses: vec!["https://gateway.example.com".into()],
//!     index_file_size: 128_000,
//!     index_file_attribute: "oid-index".into(),
//!     ..Default::default()
//! };
//!
//! // `chain` implements `Ledger`, `queue` implements `BlockSink`.
//! let service = Service::with_http_store(cfg, chain, queue, || {
//!     tracing::info!("block fetcher finished");
//! })?;
//!
//! service.start().await?;
//! // ... the pipeline runs until the archive is exhausted ...
//! service.shutdown().await;
//! ```

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub use error::{FetchError, FetchResult};

mod config;
pub use config::{
    ConfigError, FetcherConfig, UnlockWallet, DEFAULT_DOWNLOADER_WORKERS, DEFAULT_OID_BATCH_SIZE,
    DEFAULT_TIMEOUT,
};

mod ledger;
pub use ledger::{BlockSink, ChainInfo, Ledger};

mod service;
pub use service::Service;

mod discovery;
mod download;
mod enqueue;

// Re-export key types for convenience
pub use blockfetch_store::{
    CancellationToken, HttpStoreConnector, ObjectStore, SearchQuery, StoreConnect, StoreError,
};
pub use blockfetch_types::{Account, Block, Oid, Wallet};

//! Object-store abstraction for the blockfetch service.
//!
//! The fetch pipeline reads archived blocks out of a content-addressed
//! object store with attribute-based search. This crate defines the two
//! operations the pipeline needs and the backends that provide them:
//!
//! - [`ObjectStore`] trait: `get` (streaming read by identifier) and
//!   `search` (identifier lookup by attribute filters)
//! - [`StoreConnect`] trait: backend-specific connection/opening
//! - [`HttpStore`]: client for a CAS HTTP gateway
//! - [`MemStore`]: in-memory backend for tests (feature `test-utils`)
//!
//! # Cancellation
//!
//! Backends surface cancellation as [`StoreError::Cancelled`] so that
//! callers racing requests against a shutdown signal can tell an aborted
//! request from a failed one; see [`StoreError::is_cancellation`].

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
pub use error::{StoreError, StoreResult, CANCELLATION_MARKER};

mod filter;
pub use filter::{Filter, SearchQuery};

mod traits;
pub use traits::ObjectStore;

mod connect;
pub use connect::StoreConnect;

mod http;
pub use http::{HttpObject, HttpStore, HttpStoreConnector, DEFAULT_DIAL_TIMEOUT};

/// In-memory backend for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mem;

/// Conformance tests for object-store backends.
#[cfg(any(test, feature = "test-utils"))]
pub mod conformance;

// Re-export key types for convenience
pub use blockfetch_types::{Oid, OID_SIZE};
pub use tokio_util::sync::CancellationToken;

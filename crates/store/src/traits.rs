//! Core trait definition for object-store backends.

use crate::{SearchQuery, StoreResult};
use blockfetch_types::Oid;
use std::future::Future;
use tokio::io::AsyncRead;

/// A content-addressed object store with attribute search.
///
/// Backends are shared by every pipeline task, so implementations must be
/// internally synchronized. All methods are async and return futures that
/// are `Send`.
///
/// # Implementation Guide
///
/// - `get` opens a streaming read; the object is closed by dropping the
///   reader. Callers must be able to read large objects incrementally
///   without the backend buffering them whole.
/// - `search` returns every matching identifier. When a query constrains a
///   numeric attribute, results should be ordered by ascending attribute
///   value; callers emitting identifiers downstream rely on that order.
/// - `close` releases backend resources. The caller invokes it exactly once
///   at the end of the store's life; reads and searches are not issued after
///   it.
pub trait ObjectStore: Send + Sync + 'static {
    /// Streaming reader over a single object's payload.
    type Object: AsyncRead + Send + Unpin + 'static;

    /// Open a streaming read of the object with the given identifier.
    fn get(&self, id: Oid) -> impl Future<Output = StoreResult<Self::Object>> + Send;

    /// Return the identifiers of all objects matching the query.
    fn search(&self, query: SearchQuery) -> impl Future<Output = StoreResult<Vec<Oid>>> + Send;

    /// Release backend resources.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

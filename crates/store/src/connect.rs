//! Connection traits for object-store backends.

use crate::ObjectStore;

/// Connector trait for object-store backends.
///
/// Abstracts the connection/opening process, allowing different backends to
/// implement their own initialization logic. The fetch service connects at
/// start and reports connection failures synchronously.
pub trait StoreConnect {
    /// The store type produced by this connector.
    type Store: ObjectStore;

    /// The error type returned by connection attempts.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the object store asynchronously.
    fn connect(&self) -> impl std::future::Future<Output = Result<Self::Store, Self::Error>> + Send;
}

//! Error types for the fetch service.

use crate::config::ConfigError;
use blockfetch_store::StoreError;
use blockfetch_types::WalletError;

/// Result type alias for fetch service operations.
pub type FetchResult<T, E = FetchError> = Result<T, E>;

/// Error type for the fetch service.
///
/// Errors constructed by the pipeline tasks themselves (failed downloads,
/// rejected enqueues) are logged and converted into a forced teardown rather
/// than surfaced through this type; see the crate docs for the escalation
/// model.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The wallet could not be opened or unlocked.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Connecting to the object store failed.
    #[error("failed to connect to object store: {0}")]
    Connect(#[source] Box<dyn core::error::Error + Send + Sync + 'static>),

    /// The service has already been torn down and cannot be restarted.
    #[error("service already shut down")]
    Consumed,

    /// Searching for an index object failed.
    #[error("failed to find {attribute:?} object with index {index}: {source}")]
    IndexSearch {
        /// The index-file attribute searched on.
        attribute: String,
        /// The index-object ordinal.
        index: u32,
        /// The underlying store error.
        source: StoreError,
    },

    /// Fetching an index object failed.
    #[error("failed to fetch {attribute:?} object with index {index}: {source}")]
    IndexFetch {
        /// The index-file attribute searched on.
        attribute: String,
        /// The index-object ordinal.
        index: u32,
        /// The underlying store error.
        source: StoreError,
    },

    /// Reading the identifier stream of an index object failed.
    #[error("failed to stream block identifiers with index {index}: {source}")]
    OidStream {
        /// The index-object ordinal.
        index: u32,
        /// The underlying read error.
        source: std::io::Error,
    },

    /// An index object carried the wrong number of identifiers.
    #[error("block identifier count mismatch at index {index}: expected {expected}, processed {actual}")]
    OidCountMismatch {
        /// The index-object ordinal.
        index: u32,
        /// The configured index file size.
        expected: u32,
        /// The number of identifiers actually read.
        actual: u32,
    },

    /// Searching for block objects failed.
    #[error("failed to search block objects from index {index}: {source}")]
    BlockSearch {
        /// The lower bound of the failed search.
        index: u32,
        /// The underlying store error.
        source: StoreError,
    },
}

//! Error types for object-store operations.

use blockfetch_types::Oid;

/// Result type alias for object-store operations.
pub type StoreResult<T, E = StoreError> = Result<T, E>;

/// Message marker identifying a cancellation that a backend has flattened
/// into an opaque error string.
///
/// Some transports lose the typed cancellation cause and report it only in
/// the error text; [`StoreError::is_cancellation`] matches this marker so
/// callers still recognize those aborts.
pub const CANCELLATION_MARKER: &str = "request canceled";

/// Error type for object-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request was aborted by cancellation.
    #[error("request canceled")]
    Cancelled,

    /// The request exceeded its deadline.
    #[error("request deadline exceeded")]
    Timeout,

    /// The requested object does not exist.
    #[error("object {0} not found")]
    NotFound(Oid),

    /// A configured endpoint could not be parsed.
    #[error("invalid store endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The backend returned a response the client could not interpret.
    #[error("malformed store response: {0}")]
    Malformed(String),

    /// An error occurred in the storage backend or transport.
    #[error("backend error: {0}")]
    Backend(#[from] Box<dyn core::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    /// Create a new backend error from any error type.
    pub fn backend<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }

    /// Whether this error is rooted in cancellation.
    ///
    /// Matches the typed [`StoreError::Cancelled`] variant as well as
    /// backend errors that only carry the [`CANCELLATION_MARKER`] in their
    /// message.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Backend(err) => err.to_string().contains(CANCELLATION_MARKER),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("transport: {0}")]
    struct Transport(String);

    #[test]
    fn cancellation_detection() {
        assert!(StoreError::Cancelled.is_cancellation());
        assert!(StoreError::backend(Transport(format!("stream closed: {CANCELLATION_MARKER}")))
            .is_cancellation());
        assert!(!StoreError::Timeout.is_cancellation());
        assert!(!StoreError::backend(Transport("connection refused".into())).is_cancellation());
    }
}

//! Transport-level error types.

use gnoindex_core::IndexerError;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The node answered with a well-formed but unexpected payload.
    #[error("malformed {method} response: {reason}")]
    Malformed { method: &'static str, reason: String },

    /// The application rejected an `abci_query`.
    #[error("ABCI query {path} failed: {error}")]
    Abci { path: String, error: String },

    /// The owner cancelled the call.
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns `true` for transport-level failures (connection, timeout)
    /// as opposed to a node that answered with an error or garbage.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<TransportError> for IndexerError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Cancelled => IndexerError::Cancelled,
            other => IndexerError::Rpc(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_maps_to_indexer_cancelled() {
        let err: IndexerError = TransportError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: IndexerError = TransportError::Http("connection refused".into()).into();
        assert!(matches!(err, IndexerError::Rpc(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Timeout { ms: 10 }.is_retryable());
        assert!(!TransportError::Rpc(JsonRpcError::new(-32603, "x")).is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }
}

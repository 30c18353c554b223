//! Error types for the gnoindex pipeline.

use thiserror::Error;

/// Errors that can occur during syncing and indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to decode tx {index} at height {height}: {reason}")]
    Decode { height: u64, index: u32, reason: String },

    #[error("block {height} has {txs} txs but {results} results")]
    MisalignedResults { height: u64, txs: usize, results: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Storage failures halt the process: resuming past them could leave a
    /// gap the checkpoint cannot detect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors reported to query callers. These never touch sync state.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("page should be within [1, {total_pages}] range, given {page}")]
    InvalidPage { page: i64, total_pages: usize },

    #[error("invalid {param} {value:?}: expected an integer")]
    InvalidPagination { param: String, value: String },

    #[error("expected order_by to be either `asc` or `desc` or empty, given `{0}`")]
    InvalidOrderBy(String),

    #[error("invalid tx hash: {0}")]
    InvalidHash(String),

    #[error("tx {0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<IndexerError> for QueryError {
    fn from(e: IndexerError) -> Self {
        Self::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_fatal() {
        assert!(IndexerError::Storage("disk".into()).is_fatal());
        assert!(!IndexerError::Rpc("timeout".into()).is_fatal());
        assert!(!IndexerError::Decode { height: 1, index: 0, reason: "bad".into() }.is_fatal());
        assert!(!IndexerError::Cancelled.is_fatal());
        assert!(IndexerError::Cancelled.is_cancelled());
    }

    #[test]
    fn invalid_page_message() {
        let e = QueryError::InvalidPage { page: 6, total_pages: 3 };
        assert_eq!(e.to_string(), "page should be within [1, 3] range, given 6");
    }
}

//! The transaction index: durable storage of [`TxRecord`]s.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::query::Query;
use crate::types::{TxHash, TxRecord};

/// Durable keyed storage for indexed transactions.
///
/// Records are addressable by hash and by `(height, index)`; indexed event
/// attributes are kept as secondary entries keyed by
/// `(composite key, value, height, index)`.
///
/// Implementations include `MemoryStorage` and `SqliteStorage`.
#[async_trait]
pub trait TxStore: Send + Sync {
    /// Idempotent upsert. Re-indexing an identical record leaves the store
    /// unchanged; re-indexing a position with different content replaces the
    /// previous record and its secondary entries in one atomic step.
    async fn index(&self, record: &TxRecord) -> Result<(), IndexerError>;

    /// Point lookup by hash.
    async fn get(&self, hash: &TxHash) -> Result<Option<TxRecord>, IndexerError>;

    /// All records matching `query`, in no particular order.
    async fn search(&self, query: &Query) -> Result<Vec<TxRecord>, IndexerError>;
}

//! gnoindex-storage: storage backends for the transaction index.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Both implement [`TxStore`](gnoindex_core::TxStore) and
//! [`CheckpointStore`](gnoindex_core::CheckpointStore), so records and the
//! checkpoint always live in the same instance.

mod plan;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use memory::MemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

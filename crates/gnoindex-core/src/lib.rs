//! gnoindex-core: foundation for the Gno transaction indexer.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine ──► ChainClient (gnoindex-rpc)
//!     │
//!     ├── TxDecoder        raw bytes → Msg list
//!     ├── events           Msg → Event list
//!     ├── TxStore          idempotent record index (gnoindex-storage)
//!     └── CheckpointManager  last fully indexed height
//!
//! QueryEngine (gnoindex-query) ──► Query (filter parser) ──► TxStore::search
//! ```

pub mod checkpoint;
pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod msg;
pub mod query;
pub mod store;
pub mod types;

pub use checkpoint::{CheckpointManager, CheckpointStore};
pub use config::{SyncConfig, SyncState};
pub use decoder::{DecodeError, JsonTxDecoder, TxDecoder};
pub use error::{IndexerError, QueryError};
pub use events::{derive_events, derive_tx_events};
pub use msg::Msg;
pub use query::{Condition, Query};
pub use store::TxStore;
pub use types::{DeliverTx, Event, EventAttribute, ExecResult, TxHash, TxRecord};

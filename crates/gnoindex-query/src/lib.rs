//! gnoindex-query: read access to the transaction index.
//!
//! [`QueryEngine`] answers hash lookups and filtered, sorted, paginated
//! searches; [`server`] exposes it over HTTP and JSON-RPC. [`gateway`]
//! forwards VM queries to the node and decodes raw txs.

pub mod engine;
pub mod gateway;
pub mod pagination;
pub mod server;

pub use engine::{OrderBy, QueryEngine, SearchRequest, SearchResult};
pub use gateway::{DecodedTx, Gateway, GatewayError};
pub use server::{router, serve, serve_router, ResultTx, ResultTxSearch};

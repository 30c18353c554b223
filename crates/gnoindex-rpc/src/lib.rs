//! gnoindex-rpc: resilient chain client for Tendermint/Gno nodes.
//!
//! Layers, bottom up:
//!
//! - [`RpcTransport`]: one JSON-RPC request, one attempt ([`HttpTransport`]).
//! - [`NodeClient`]: typed `status` / `block` / `block_results` and
//!   `abci_query` calls.
//! - [`RetryClient`]: exponential backoff and cancellation over any
//!   [`ChainClient`].

pub mod client;
pub mod error;
pub mod http;
pub mod node;
pub mod policy;
pub mod request;
pub mod retry_client;
pub mod transport;

pub use client::{AbciClient, ChainClient};
pub use error::TransportError;
pub use http::{HttpTransport, HttpTransportConfig};
pub use node::NodeClient;
pub use policy::{RetryConfig, RetryPolicy};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry_client::RetryClient;
pub use transport::RpcTransport;

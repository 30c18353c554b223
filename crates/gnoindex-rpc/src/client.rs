//! Typed node clients: [`ChainClient`] for the sync engine and
//! [`AbciClient`] for the query gateway.

use std::sync::Arc;

use async_trait::async_trait;
use gnoindex_core::DeliverTx;

use crate::error::TransportError;

/// Read access to a Tendermint-style node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Height of the node's latest committed block.
    async fn status(&self) -> Result<u64, TransportError>;

    /// Raw transactions of the block at `height`, in block order.
    async fn block(&self, height: u64) -> Result<Vec<Vec<u8>>, TransportError>;

    /// Execution outcomes of the block at `height`, aligned by index with
    /// [`block`](Self::block).
    async fn block_results(&self, height: u64) -> Result<Vec<DeliverTx>, TransportError>;
}

#[async_trait]
impl<C: ChainClient + ?Sized> ChainClient for Arc<C> {
    async fn status(&self) -> Result<u64, TransportError> {
        (**self).status().await
    }

    async fn block(&self, height: u64) -> Result<Vec<Vec<u8>>, TransportError> {
        (**self).block(height).await
    }

    async fn block_results(&self, height: u64) -> Result<Vec<DeliverTx>, TransportError> {
        (**self).block_results(height).await
    }
}

/// Application-level queries (`abci_query`) against the node.
#[async_trait]
pub trait AbciClient: Send + Sync {
    /// Run the query at `path` with `data` and return the response data.
    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<C: AbciClient + ?Sized> AbciClient for Arc<C> {
    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).abci_query(path, data).await
    }
}

//! The sync engine: walks the chain height by height and indexes every tx.
//!
//! # Init
//! Load the checkpoint; the next height is one past it, or the configured
//! start height when there is none.
//!
//! # Catchup
//! Ask the node for its latest height and index every block up to it, in
//! order. A block's checkpoint is persisted before the next block starts.
//!
//! # Idle
//! Sleep for the poll interval, then catch up again.

use std::sync::Arc;

use gnoindex_core::checkpoint::{CheckpointManager, CheckpointStore};
use gnoindex_core::error::IndexerError;
use gnoindex_core::{derive_tx_events, ExecResult, SyncConfig, SyncState, TxDecoder, TxRecord, TxStore};
use gnoindex_rpc::ChainClient;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Sequential, resumable indexer over a [`ChainClient`].
pub struct SyncEngine<C: ChainClient> {
    config: SyncConfig,
    client: C,
    decoder: Arc<dyn TxDecoder>,
    store: Arc<dyn TxStore>,
    checkpoint: CheckpointManager,
    txs: broadcast::Sender<TxRecord>,
    state: watch::Sender<SyncState>,
    cancel: CancellationToken,
}

impl<C: ChainClient> SyncEngine<C> {
    pub fn new(
        config: SyncConfig,
        client: C,
        decoder: Arc<dyn TxDecoder>,
        store: Arc<dyn TxStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        cancel: CancellationToken,
    ) -> Self {
        let (txs, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let (state, _) = watch::channel(SyncState::Init);
        Self {
            config,
            client,
            decoder,
            store,
            checkpoint: CheckpointManager::new(checkpoints),
            txs,
            state,
            cancel,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Follow state changes from another task.
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Receive every record right after it is written to the store.
    ///
    /// Slow receivers lag and miss records; indexing never waits for them.
    pub fn subscribe(&self) -> broadcast::Receiver<TxRecord> {
        self.txs.subscribe()
    }

    /// Last fully indexed height, as of the latest init or block.
    pub fn checkpoint(&self) -> Option<u64> {
        self.checkpoint.height()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One Init + Catchup pass. Returns the height indexing is complete
    /// through.
    pub async fn run_cycle(&mut self) -> Result<u64, IndexerError> {
        self.init().await?;
        self.catch_up().await
    }

    /// Sync until cancelled (`Ok`) or until a cycle fails.
    pub async fn run(&mut self) -> Result<(), IndexerError> {
        let res = self.run_inner().await;
        self.set_state(SyncState::Stopped);
        match res {
            Err(e) if e.is_cancelled() => {
                tracing::info!(checkpoint = ?self.checkpoint.height(), "sync stopped");
                Ok(())
            }
            other => other,
        }
    }

    async fn run_inner(&mut self) -> Result<(), IndexerError> {
        self.init().await?;
        loop {
            self.catch_up().await?;
            self.idle().await?;
        }
    }

    async fn init(&mut self) -> Result<(), IndexerError> {
        self.set_state(SyncState::Init);
        match self.checkpoint.load().await? {
            Some(height) => tracing::info!(height, "Resuming from checkpoint"),
            None => tracing::info!(
                start_height = self.config.start_height,
                "No checkpoint, starting fresh"
            ),
        }
        Ok(())
    }

    async fn catch_up(&mut self) -> Result<u64, IndexerError> {
        self.set_state(SyncState::Catchup);
        let latest = self.client.status().await?;
        let next = self.checkpoint.next_height(self.config.start_height);

        if next <= latest {
            tracing::info!(from = next, to = latest, "Catching up");
        }
        for height in next..=latest {
            if self.cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            self.index_block(height).await?;
        }

        Ok(self.checkpoint.height().unwrap_or(next.saturating_sub(1)))
    }

    async fn idle(&mut self) -> Result<(), IndexerError> {
        self.set_state(SyncState::Idle);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IndexerError::Cancelled),
            _ = tokio::time::sleep(self.config.poll_interval()) => Ok(()),
        }
    }

    async fn index_block(&mut self, height: u64) -> Result<(), IndexerError> {
        let txs = self.client.block(height).await?;

        if !txs.is_empty() {
            let results = self.client.block_results(height).await?;
            if results.len() != txs.len() {
                return Err(IndexerError::MisalignedResults {
                    height,
                    txs: txs.len(),
                    results: results.len(),
                });
            }

            let count = txs.len();
            for (index, (tx, result)) in txs.into_iter().zip(results).enumerate() {
                let index = index as u32;
                let msgs = self.decoder.decode(&tx).map_err(|e| IndexerError::Decode {
                    height,
                    index,
                    reason: e.to_string(),
                })?;
                let events = derive_tx_events(&msgs);
                let record = TxRecord::new(height, index, tx, ExecResult::from_deliver_tx(result, events));

                self.store.index(&record).await?;
                tracing::debug!(
                    height,
                    index,
                    hash = %record.hash,
                    code = record.result.code,
                    msgs = msgs.len(),
                    "tx indexed"
                );

                // No subscribers is fine.
                let _ = self.txs.send(record);
            }

            tracing::info!(height, txs = count, "Block indexed");
        } else {
            tracing::trace!(height, "empty block");
        }

        self.checkpoint.advance(height).await
    }

    fn set_state(&self, state: SyncState) {
        self.state.send_replace(state);
    }
}

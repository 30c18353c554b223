//! Fluent builder API for creating sync engines.
//!
//! # Example
//!
//! ```rust,no_run
//! use gnoindex_sync::SyncEngineBuilder;
//!
//! let config = SyncEngineBuilder::new()
//!     .start_height(1)
//!     .poll_interval_ms(6_000)
//!     .max_retries(Some(10))
//!     .build_config();
//! ```

use std::sync::Arc;

use gnoindex_core::checkpoint::CheckpointStore;
use gnoindex_core::{SyncConfig, TxDecoder, TxStore};
use gnoindex_rpc::{ChainClient, RetryClient, RetryConfig};
use tokio_util::sync::CancellationToken;

use crate::engine::SyncEngine;

/// Fluent builder for [`SyncEngine`].
#[derive(Default)]
pub struct SyncEngineBuilder {
    config: SyncConfig,
    retry: RetryConfig,
    cancel: Option<CancellationToken>,
}

impl SyncEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first height indexed when no checkpoint exists.
    pub fn start_height(mut self, height: u64) -> Self {
        self.config.start_height = height;
        self
    }

    /// Set the idle polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the delay before a failed cycle is restarted.
    pub fn restart_delay_ms(mut self, ms: u64) -> Self {
        self.config.restart_delay_ms = ms;
        self
    }

    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.config.broadcast_capacity = capacity;
        self
    }

    /// Replace the whole sync configuration.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the retry policy for chain calls.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Cap retries per chain call (`None` retries forever).
    pub fn max_retries(mut self, max: Option<u32>) -> Self {
        self.retry.max_retries = max;
        self
    }

    /// Share a cancellation token with the caller.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the `SyncConfig`.
    pub fn build_config(self) -> SyncConfig {
        self.config
    }

    /// Build an engine whose chain calls go through a [`RetryClient`] sharing
    /// the engine's cancellation token. `store` backs both the index and the
    /// checkpoint.
    pub fn build<C, S>(self, client: C, decoder: Arc<dyn TxDecoder>, store: Arc<S>) -> SyncEngine<RetryClient<C>>
    where
        C: ChainClient,
        S: TxStore + CheckpointStore + 'static,
    {
        let cancel = self.cancel.unwrap_or_default();
        let client = RetryClient::new(client, self.retry, cancel.clone());
        let checkpoints: Arc<dyn CheckpointStore> = store.clone();
        SyncEngine::new(self.config, client, decoder, store, checkpoints, cancel)
    }
}

//! Owner loop that keeps the sync engine running.
//!
//! Recoverable failures (node errors, undecodable txs, misaligned results)
//! restart the engine from its checkpoint after `restart_delay`. Storage
//! failures halt. Cancellation stops cleanly.

use std::time::Duration;

use gnoindex_core::error::IndexerError;
use gnoindex_rpc::ChainClient;
use tokio_util::sync::CancellationToken;

use crate::engine::SyncEngine;

pub struct Supervisor<C: ChainClient> {
    engine: SyncEngine<C>,
    restart_delay: Duration,
    cancel: CancellationToken,
}

impl<C: ChainClient> Supervisor<C> {
    pub fn new(engine: SyncEngine<C>) -> Self {
        let restart_delay = engine.config().restart_delay();
        let cancel = engine.cancel_token();
        Self {
            engine,
            restart_delay,
            cancel,
        }
    }

    pub fn engine(&self) -> &SyncEngine<C> {
        &self.engine
    }

    /// Run until cancelled (`Ok`) or a fatal error (`Err`).
    pub async fn run(mut self) -> Result<(), IndexerError> {
        let mut restarts = 0u64;
        loop {
            let err = match self.engine.run().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_cancelled() => return Ok(()),
                Err(e) => e,
            };

            if err.is_fatal() {
                tracing::error!(
                    error = %err,
                    checkpoint = ?self.engine.checkpoint(),
                    "fatal storage error, halting sync"
                );
                return Err(err);
            }

            restarts += 1;
            tracing::warn!(
                error = %err,
                restarts,
                delay_ms = self.restart_delay.as_millis() as u64,
                checkpoint = ?self.engine.checkpoint(),
                "sync cycle failed, restarting"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.restart_delay) => {}
            }
        }
    }
}

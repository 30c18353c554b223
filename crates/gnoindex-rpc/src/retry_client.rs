//! Retrying, cancellable wrapper around any [`ChainClient`].

use std::future::Future;

use async_trait::async_trait;
use gnoindex_core::DeliverTx;
use tokio_util::sync::CancellationToken;

use crate::client::ChainClient;
use crate::error::TransportError;
use crate::policy::{RetryConfig, RetryPolicy};

/// Retries every failed call with exponential backoff until it succeeds, the
/// retry ceiling is reached, or the token is cancelled.
///
/// Each retry emits an event with the attempt number, the delay and the
/// error: `warn` for transient failures, `error` for anything the node
/// answered wrongly. Both are retried. Cancellation aborts both in-flight calls and backoff sleeps
/// with [`TransportError::Cancelled`].
pub struct RetryClient<C> {
    inner: C,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<C: ChainClient> RetryClient<C> {
    pub fn new(inner: C, config: RetryConfig, cancel: CancellationToken) -> Self {
        Self {
            inner,
            policy: RetryPolicy::new(config),
            cancel,
        }
    }

    async fn with_retry<T, F, Fut>(&self, method: &'static str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, TransportError>> + Send,
        T: Send,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransportError::Cancelled),
                res = op() => res,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(TransportError::Cancelled) => return Err(TransportError::Cancelled),
                Err(e) => e,
            };

            attempt = attempt.saturating_add(1);
            let Some(delay) = self.policy.next_delay(attempt) else {
                tracing::error!(method, attempt, error = %err, "max retries exceeded");
                return Err(err);
            };

            let delay_ms = delay.as_millis() as u64;
            if err.is_retryable() {
                tracing::warn!(method, attempt, delay_ms, error = %err, "retrying request");
            } else {
                tracing::error!(method, attempt, delay_ms, error = %err, "unexpected node response, retrying");
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[async_trait]
impl<C: ChainClient> ChainClient for RetryClient<C> {
    async fn status(&self) -> Result<u64, TransportError> {
        self.with_retry("status", || self.inner.status()).await
    }

    async fn block(&self, height: u64) -> Result<Vec<Vec<u8>>, TransportError> {
        self.with_retry("block", || self.inner.block(height)).await
    }

    async fn block_results(&self, height: u64) -> Result<Vec<DeliverTx>, TransportError> {
        self.with_retry("block_results", || self.inner.block_results(height)).await
    }
}

//! HTTP JSON-RPC transport backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Single-attempt HTTP transport: one POST per request.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout: config.request_timeout,
        })
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(method = %req.method, url = %self.url, "sending request");

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| self.map_reqwest(e))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let t = HttpTransport::new("http://localhost:26657", HttpTransportConfig::default()).unwrap();
        assert_eq!(t.url(), "http://localhost:26657");
        assert_eq!(t.request_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn unreachable_node_is_an_http_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let t = HttpTransport::new(
            "http://127.0.0.1:9",
            HttpTransportConfig {
                request_timeout: Duration::from_secs(2),
            },
        )
        .unwrap();
        let req = JsonRpcRequest::new(1, "status", Default::default());
        let err = t.send(req).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }
}

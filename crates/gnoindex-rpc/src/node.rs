//! `ChainClient` over a node's JSON-RPC endpoints.
//!
//! Payload shapes follow the Tendermint/Gno conventions: 64-bit integers
//! travel as decimal strings, byte slices as base64, and empty lists may
//! arrive as `null`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gnoindex_core::DeliverTx;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::client::{AbciClient, ChainClient};
use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;

/// Typed client over an [`RpcTransport`].
pub struct NodeClient<T> {
    transport: T,
    next_id: AtomicU64,
}

impl<T: RpcTransport> NodeClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    async fn call<R: for<'de> Deserialize<'de>>(
        &self,
        method: &'static str,
        params: Map<String, Value>,
    ) -> Result<R, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self.transport.send(JsonRpcRequest::new(id, method, params)).await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        serde_json::from_value(result).map_err(TransportError::Deserialization)
    }

    fn height_param(height: u64) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("height".into(), Value::String(height.to_string()));
        params
    }
}

#[async_trait]
impl<T: RpcTransport> ChainClient for NodeClient<T> {
    async fn status(&self) -> Result<u64, TransportError> {
        let status: StatusResult = self.call("status", Map::new()).await?;
        parse_i64_str("status", &status.sync_info.latest_block_height).and_then(|h| {
            u64::try_from(h).map_err(|_| malformed("status", format!("negative height {h}")))
        })
    }

    async fn block(&self, height: u64) -> Result<Vec<Vec<u8>>, TransportError> {
        let block: BlockResult = self.call("block", Self::height_param(height)).await?;
        block
            .block
            .data
            .txs
            .unwrap_or_default()
            .iter()
            .map(|tx| decode_b64("block", tx))
            .collect()
    }

    async fn block_results(&self, height: u64) -> Result<Vec<DeliverTx>, TransportError> {
        let results: BlockResultsResult = self.call("block_results", Self::height_param(height)).await?;
        results
            .results
            .deliver_tx
            .unwrap_or_default()
            .into_iter()
            .map(RawDeliverTx::into_deliver_tx)
            .collect()
    }
}

#[async_trait]
impl<T: RpcTransport> AbciClient for NodeClient<T> {
    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut params = Map::new();
        params.insert("path".into(), Value::String(path.to_string()));
        params.insert("data".into(), Value::String(STANDARD.encode(data)));

        let res: AbciQueryResult = self.call("abci_query", params).await?;
        let base = res.response.base;
        if let Some(error) = error_text(base.error) {
            let log = base.log.unwrap_or_default();
            return Err(TransportError::Abci {
                path: path.to_string(),
                error: if log.is_empty() { error } else { format!("{error}: {log}") },
            });
        }
        match base.data {
            Some(d) => decode_b64("abci_query", &d),
            None => Ok(Vec::new()),
        }
    }
}

// ─── Wire shapes ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Deserialize)]
struct BlockResult {
    block: Block,
}

#[derive(Deserialize)]
struct Block {
    data: BlockData,
}

#[derive(Deserialize)]
struct BlockData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct BlockResultsResult {
    results: BlockResults,
}

#[derive(Deserialize)]
struct BlockResults {
    #[serde(default)]
    deliver_tx: Option<Vec<RawDeliverTx>>,
}

#[derive(Deserialize)]
struct RawDeliverTx {
    #[serde(rename = "ResponseBase")]
    base: ResponseBase,
    #[serde(rename = "GasWanted", default)]
    gas_wanted: Option<String>,
    #[serde(rename = "GasUsed", default)]
    gas_used: Option<String>,
}

#[derive(Deserialize)]
struct AbciQueryResult {
    response: ResponseQuery,
}

#[derive(Deserialize)]
struct ResponseQuery {
    #[serde(rename = "ResponseBase")]
    base: ResponseBase,
}

#[derive(Deserialize)]
struct ResponseBase {
    #[serde(rename = "Error", default)]
    error: Option<Value>,
    #[serde(rename = "Data", default)]
    data: Option<String>,
    #[serde(rename = "Log", default)]
    log: Option<String>,
    #[serde(rename = "Info", default)]
    info: Option<String>,
}

impl RawDeliverTx {
    fn into_deliver_tx(self) -> Result<DeliverTx, TransportError> {
        let error = error_text(self.base.error);
        let data = match self.base.data {
            Some(d) => decode_b64("block_results", &d)?,
            None => Vec::new(),
        };
        Ok(DeliverTx {
            error,
            data,
            log: self.base.log.unwrap_or_default(),
            info: self.base.info.unwrap_or_default(),
            gas_wanted: opt_i64("block_results", self.gas_wanted.as_deref())?,
            gas_used: opt_i64("block_results", self.gas_used.as_deref())?,
        })
    }
}

/// Amino errors arrive as `null`, a string, or a typed object.
fn error_text(error: Option<Value>) -> Option<String> {
    match error {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    }
}

fn malformed(method: &'static str, reason: String) -> TransportError {
    TransportError::Malformed { method, reason }
}

fn decode_b64(method: &'static str, s: &str) -> Result<Vec<u8>, TransportError> {
    STANDARD
        .decode(s)
        .map_err(|e| malformed(method, format!("invalid base64: {e}")))
}

fn parse_i64_str(method: &'static str, s: &str) -> Result<i64, TransportError> {
    s.parse()
        .map_err(|e| malformed(method, format!("invalid integer {s:?}: {e}")))
}

fn opt_i64(method: &'static str, s: Option<&str>) -> Result<i64, TransportError> {
    match s {
        None | Some("") => Ok(0),
        Some(s) => parse_i64_str(method, s),
    }
}

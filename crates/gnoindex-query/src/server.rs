//! HTTP and JSON-RPC front end for the [`QueryEngine`].
//!
//! Routes:
//! - `GET /tx?hash=<hex>`
//! - `GET /tx_search?query=<q>&page=&per_page=&order_by=`
//! - `POST /` JSON-RPC 2.0, methods `tx` and `tx_search`
//! - `GET /health`
//!
//! Responses use the Tendermint `ResultTx` / `ResultTxSearch` layout.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query as UrlQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gnoindex_core::{Event, QueryError, TxHash, TxRecord};
use gnoindex_rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::engine::{QueryEngine, SearchRequest, SearchResult};

// ─── Response shapes ──────────────────────────────────────────────────────────

/// Execution result in the node's wire layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResultView {
    pub code: u32,
    /// base64
    pub data: String,
    pub log: String,
    pub info: String,
    pub gas_wanted: String,
    pub gas_used: String,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTx {
    pub hash: TxHash,
    pub height: String,
    pub index: u32,
    pub tx_result: TxResultView,
    /// base64
    pub tx: String,
}

impl From<TxRecord> for ResultTx {
    fn from(rec: TxRecord) -> Self {
        Self {
            hash: rec.hash,
            height: rec.height.to_string(),
            index: rec.index,
            tx_result: TxResultView {
                code: rec.result.code,
                data: STANDARD.encode(&rec.result.data),
                log: rec.result.log,
                info: rec.result.info,
                gas_wanted: rec.result.gas_wanted.to_string(),
                gas_used: rec.result.gas_used.to_string(),
                events: rec.result.events,
            },
            tx: STANDARD.encode(&rec.tx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTxSearch {
    pub txs: Vec<ResultTx>,
    pub total_count: String,
}

impl From<SearchResult> for ResultTxSearch {
    fn from(res: SearchResult) -> Self {
        Self {
            txs: res.txs.into_iter().map(ResultTx::from).collect(),
            total_count: res.total_count.to_string(),
        }
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Query failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub QueryError);

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            QueryError::NotFound(_) => StatusCode::NOT_FOUND,
            QueryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QueryError::InvalidFilter(_)
            | QueryError::InvalidPage { .. }
            | QueryError::InvalidPagination { .. }
            | QueryError::InvalidOrderBy(_)
            | QueryError::InvalidHash(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn rpc_code(&self) -> i64 {
        match self.0 {
            QueryError::NotFound(_) | QueryError::Storage(_) => JsonRpcError::INTERNAL_ERROR,
            _ => JsonRpcError::INVALID_PARAMS,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "query failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct TxParams {
    hash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TxSearchParams {
    query: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
    order_by: Option<String>,
}

/// URI parameters may arrive JSON-quoted (`query="tx.height=5"`).
fn unquote(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

/// Hex (as printed) or base64 (how Tendermint clients encode `[]byte`).
fn parse_hash(raw: Option<&str>) -> Result<TxHash, QueryError> {
    let raw = unquote(raw.ok_or_else(|| QueryError::InvalidHash("missing hash".into()))?);
    raw.parse::<TxHash>().or_else(|hex_err| {
        STANDARD
            .decode(raw)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .map(TxHash::from_bytes)
            .ok_or(hex_err)
    })
}

fn parse_int(name: &str, raw: Option<&str>) -> Result<Option<i64>, QueryError> {
    match raw.map(unquote) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| QueryError::InvalidPagination {
                param: name.to_string(),
                value: s.to_string(),
            }),
    }
}

impl TxSearchParams {
    fn into_request(self) -> Result<SearchRequest, QueryError> {
        Ok(SearchRequest {
            query: self.query.as_deref().map(unquote).unwrap_or_default().to_string(),
            page: parse_int("page", self.page.as_deref())?,
            per_page: parse_int("per_page", self.per_page.as_deref())?,
            order_by: self.order_by.as_deref().map(unquote).unwrap_or_default().to_string(),
        })
    }
}

async fn tx_handler(
    State(engine): State<Arc<QueryEngine>>,
    UrlQuery(params): UrlQuery<TxParams>,
) -> ApiResult<ResultTx> {
    let hash = parse_hash(params.hash.as_deref())?;
    Ok(Json(engine.get_tx(&hash).await?.into()))
}

async fn tx_search_handler(
    State(engine): State<Arc<QueryEngine>>,
    UrlQuery(params): UrlQuery<TxSearchParams>,
) -> ApiResult<ResultTxSearch> {
    let req = params.into_request()?;
    Ok(Json(engine.search_tx(&req).await?.into()))
}

async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ─── JSON-RPC ─────────────────────────────────────────────────────────────────

/// Named (`{..}`) or positional (`[..]`) params, mapped onto `names`.
fn named_params(params: Value, names: &[&str]) -> Result<serde_json::Map<String, Value>, JsonRpcError> {
    match params {
        Value::Null => Ok(Default::default()),
        Value::Object(map) => Ok(map),
        Value::Array(items) => {
            if items.len() > names.len() {
                return Err(JsonRpcError::new(
                    JsonRpcError::INVALID_PARAMS,
                    format!("expected at most {} params, got {}", names.len(), items.len()),
                ));
            }
            Ok(names.iter().map(|n| n.to_string()).zip(items).collect())
        }
        other => Err(JsonRpcError::new(
            JsonRpcError::INVALID_PARAMS,
            format!("params must be an object or array, got {other}"),
        )),
    }
}

/// A param as a string: strings pass through, numbers are rendered.
fn param_str(params: &serde_json::Map<String, Value>, name: &str) -> Option<String> {
    match params.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn to_rpc_error(e: QueryError) -> JsonRpcError {
    let api = ApiError(e);
    let mut err = JsonRpcError::new(api.rpc_code(), "query failed");
    err.data = Some(Value::String(api.0.to_string()));
    err
}

fn encode<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, e.to_string()))
}

async fn dispatch(engine: &QueryEngine, req: JsonRpcRequest) -> Result<Value, JsonRpcError> {
    match req.method.as_str() {
        "tx" => {
            let params = named_params(req.params, &["hash"])?;
            let hash = parse_hash(param_str(&params, "hash").as_deref()).map_err(to_rpc_error)?;
            let rec = engine.get_tx(&hash).await.map_err(to_rpc_error)?;
            encode(ResultTx::from(rec))
        }
        "tx_search" => {
            let params = named_params(req.params, &["query", "page", "per_page", "order_by"])?;
            let search = TxSearchParams {
                query: param_str(&params, "query"),
                page: param_str(&params, "page"),
                per_page: param_str(&params, "per_page"),
                order_by: param_str(&params, "order_by"),
            }
            .into_request()
            .map_err(to_rpc_error)?;
            let res = engine.search_tx(&search).await.map_err(to_rpc_error)?;
            encode(ResultTxSearch::from(res))
        }
        other => Err(JsonRpcError::new(
            JsonRpcError::METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        )),
    }
}

/// Decode a request body, answering protocol errors in a JSON-RPC envelope.
fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        JsonRpcResponse::failure(RpcId::Null, JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("parse error: {e}")))
    })?;
    if value.is_array() {
        return Err(JsonRpcResponse::failure(
            RpcId::Null,
            JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "batch requests are not supported"),
        ));
    }
    let id = value.get("id").cloned().and_then(|id| serde_json::from_value(id).ok()).unwrap_or_default();
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::failure(id, JsonRpcError::new(JsonRpcError::INVALID_REQUEST, format!("invalid request: {e}")))
    })
}

async fn rpc_handler(State(engine): State<Arc<QueryEngine>>, body: Bytes) -> Json<JsonRpcResponse> {
    let req = match parse_request(&body) {
        Ok(req) => req,
        Err(resp) => return Json(resp),
    };
    let id = req.id.clone();
    tracing::debug!(method = %req.method, id = %id, "rpc request");
    Json(match dispatch(&engine, req).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(err) => JsonRpcResponse::failure(id, err),
    })
}

// ─── Server ───────────────────────────────────────────────────────────────────

/// All query routes over a shared engine.
pub fn router(engine: Arc<QueryEngine>) -> Router {
    Router::new()
        .route("/", post(rpc_handler))
        .route("/tx", get(tx_handler))
        .route("/tx_search", get(tx_search_handler))
        .route("/health", get(health_handler))
        .with_state(engine)
}

/// Serve the query routes on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<QueryEngine>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    serve_router(listener, router(engine), shutdown).await
}

/// Serve any composed router, e.g. the query routes merged with the gateway.
pub async fn serve_router(listener: TcpListener, app: Router, shutdown: CancellationToken) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "query server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

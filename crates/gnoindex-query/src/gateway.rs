//! Node pass-through routes that sit next to the index.
//!
//! - `GET /gno/render?realm=&query=`: `vm/qrender`, the realm's rendered text
//! - `GET /gno/eval?realm=&func=`: `vm/qeval`, the expression result as text
//! - `GET /gno/funcs?realm=`: `vm/qfuncs`, exported function signatures (JSON)
//! - `GET /txs/decode?tx=<base64>`: messages and derived events of a raw tx
//!
//! Nothing here reads or writes the index.

use std::sync::Arc;

use axum::extract::{Query as UrlQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gnoindex_core::{derive_tx_events, Event, Msg, TxDecoder, TxHash};
use gnoindex_rpc::{AbciClient, TransportError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const QRENDER_PATH: &str = "vm/qrender";
pub const QEVAL_PATH: &str = "vm/qeval";
pub const QFUNCS_PATH: &str = "vm/qfuncs";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} param is required")]
    MissingParam(&'static str),

    #[error("cannot decode tx: {0}")]
    InvalidTx(String),

    #[error(transparent)]
    Node(#[from] TransportError),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingParam(_) | Self::InvalidTx(_) | Self::Node(TransportError::Abci { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Node(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "node query failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Node access and tx decoding shared by the gateway routes.
pub struct Gateway {
    node: Arc<dyn AbciClient>,
    decoder: Arc<dyn TxDecoder>,
}

impl Gateway {
    pub fn new(node: Arc<dyn AbciClient>, decoder: Arc<dyn TxDecoder>) -> Self {
        Self { node, decoder }
    }

    /// `vm/qrender` with `"<realm>\n<query>"`.
    pub async fn render(&self, realm: &str, query: &str) -> Result<String, GatewayError> {
        self.text(QRENDER_PATH, format!("{realm}\n{query}")).await
    }

    /// `vm/qeval` with `"<realm>\n<expression>"`.
    pub async fn eval(&self, realm: &str, expr: &str) -> Result<String, GatewayError> {
        self.text(QEVAL_PATH, format!("{realm}\n{expr}")).await
    }

    /// `vm/qfuncs` for `realm`.
    pub async fn funcs(&self, realm: &str) -> Result<String, GatewayError> {
        self.text(QFUNCS_PATH, realm.to_string()).await
    }

    /// Decode a base64 tx the way the indexer would.
    pub fn decode(&self, tx_b64: &str) -> Result<DecodedTx, GatewayError> {
        let tx = STANDARD
            .decode(tx_b64)
            .map_err(|e| GatewayError::InvalidTx(e.to_string()))?;
        let msgs = self
            .decoder
            .decode(&tx)
            .map_err(|e| GatewayError::InvalidTx(e.to_string()))?;
        Ok(DecodedTx {
            hash: TxHash::of(&tx),
            events: derive_tx_events(&msgs),
            msgs,
        })
    }

    async fn text(&self, path: &str, data: String) -> Result<String, GatewayError> {
        tracing::debug!(path, "abci query");
        let res = self.node.abci_query(path, data.as_bytes()).await?;
        Ok(String::from_utf8_lossy(&res).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTx {
    pub hash: TxHash,
    pub msgs: Vec<Msg>,
    pub events: Vec<Event>,
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct VmParams {
    realm: Option<String>,
    query: Option<String>,
    func: Option<String>,
}

impl VmParams {
    fn realm(&self) -> Result<&str, GatewayError> {
        self.realm
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or(GatewayError::MissingParam("realm"))
    }
}

#[derive(Debug, Default, Deserialize)]
struct DecodeParams {
    tx: Option<String>,
}

async fn render_handler(
    State(gw): State<Arc<Gateway>>,
    UrlQuery(params): UrlQuery<VmParams>,
) -> Result<String, GatewayError> {
    gw.render(params.realm()?, params.query.as_deref().unwrap_or_default()).await
}

async fn eval_handler(
    State(gw): State<Arc<Gateway>>,
    UrlQuery(params): UrlQuery<VmParams>,
) -> Result<String, GatewayError> {
    let expr = params.func.as_deref().ok_or(GatewayError::MissingParam("func"))?;
    gw.eval(params.realm()?, expr).await
}

async fn funcs_handler(
    State(gw): State<Arc<Gateway>>,
    UrlQuery(params): UrlQuery<VmParams>,
) -> Result<Response, GatewayError> {
    let body = gw.funcs(params.realm()?).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn decode_handler(
    State(gw): State<Arc<Gateway>>,
    UrlQuery(params): UrlQuery<DecodeParams>,
) -> Result<Json<DecodedTx>, GatewayError> {
    let tx = params
        .tx
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(GatewayError::MissingParam("tx"))?;
    Ok(Json(gw.decode(tx)?))
}

/// Gateway routes over a shared [`Gateway`].
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/gno/render", get(render_handler))
        .route("/gno/eval", get(eval_handler))
        .route("/gno/funcs", get(funcs_handler))
        .route("/txs/decode", get(decode_handler))
        .with_state(gateway)
}

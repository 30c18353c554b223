//! `gnoindex run`: sync loop, query server and node gateway in one process.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use gnoindex_core::JsonTxDecoder;
use gnoindex_query::{Gateway, QueryEngine};
use gnoindex_rpc::{HttpTransport, HttpTransportConfig, NodeClient};
use gnoindex_storage::SqliteStorage;
use gnoindex_sync::{Supervisor, SyncEngineBuilder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Node JSON-RPC URL
    #[arg(long, env = "GNOINDEX_REMOTE", default_value = "http://localhost:26657")]
    pub remote: String,

    /// Query server listen address
    #[arg(long, env = "GNOINDEX_LISTEN", default_value = "0.0.0.0:8094")]
    pub listen: String,

    /// SQLite database path
    #[arg(long, env = "GNOINDEX_DB", default_value = "./data/tx_index.db")]
    pub db: String,

    /// First height to index when the database has no checkpoint
    #[arg(long, default_value_t = 1)]
    pub start: u64,

    /// Idle polling interval once caught up (milliseconds)
    #[arg(long, default_value_t = 6_000)]
    pub poll_interval_ms: u64,

    /// Delay before restarting after a failed sync cycle (milliseconds)
    #[arg(long, default_value_t = 6_000)]
    pub restart_delay_ms: u64,

    /// Retries per node call before the cycle fails (default: unlimited)
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-request HTTP timeout (seconds)
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,
}

pub async fn run(args: RunArgs) -> Result<()> {
    if let Some(dir) = Path::new(&args.db).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let store = Arc::new(
        SqliteStorage::open(&args.db)
            .await
            .with_context(|| format!("opening database {}", args.db))?,
    );

    let transport = Arc::new(HttpTransport::new(
        args.remote.clone(),
        HttpTransportConfig {
            request_timeout: std::time::Duration::from_secs(args.request_timeout_secs),
        },
    )?);

    let decoder = Arc::new(JsonTxDecoder::new());
    let cancel = CancellationToken::new();
    let engine = SyncEngineBuilder::new()
        .start_height(args.start)
        .poll_interval_ms(args.poll_interval_ms)
        .restart_delay_ms(args.restart_delay_ms)
        .max_retries(args.max_retries)
        .cancel_token(cancel.clone())
        .build(NodeClient::new(transport.clone()), decoder.clone(), store.clone());

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    let query = Arc::new(QueryEngine::new(store));
    let gateway = Arc::new(Gateway::new(Arc::new(NodeClient::new(transport)), decoder));
    let app = gnoindex_query::router(query).merge(gnoindex_query::gateway::router(gateway));

    info!(remote = %args.remote, listen = %args.listen, db = %args.db, "gnoindex starting");

    let server = tokio::spawn(gnoindex_query::serve_router(listener, app, cancel.clone()));
    let sync = tokio::spawn(Supervisor::new(engine).run());

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        signal_cancel.cancel();
    });

    let sync_result = sync.await.context("sync task panicked")?;
    if let Err(e) = &sync_result {
        error!(error = %e, "sync halted");
    }
    // Stop the server whether sync ended by signal or by a fatal error.
    cancel.cancel();
    server.await.context("server task panicked")??;

    sync_result.context("sync failed")
}

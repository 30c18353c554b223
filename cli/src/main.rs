//! gnoindex CLI: sync a Gno chain into a local transaction index and serve
//! lookups and searches over it.
//!
//! # Commands
//! ```text
//! gnoindex run     --remote <url> --listen <addr> --db <path>
//! gnoindex status  --db <path>
//! gnoindex version
//! ```

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

mod cmd_run;
mod cmd_status;
mod logging;

use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "gnoindex",
    about = "Transaction indexer for Gno chains",
    long_about = "
gnoindex follows a Gno (Tendermint2) node, indexes every transaction with the
events derived from its messages, and answers `tx` / `tx_search` queries.

ENVIRONMENT VARIABLES:
  GNOINDEX_REMOTE   Node JSON-RPC URL
  GNOINDEX_LISTEN   Query server listen address
  GNOINDEX_DB       SQLite database path
  RUST_LOG          Overrides --log-level / --log-component
",
    version
)]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LogArgs {
    /// Default log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Per-crate level override, e.g. `gnoindex-rpc=debug` (repeatable)
    #[arg(long = "log-component", global = true, value_parser = parse_component)]
    log_components: Vec<(String, String)>,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    log_json: bool,
}

impl LogArgs {
    fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            components: self.log_components.iter().cloned().collect(),
            json: self.log_json,
        }
    }
}

fn parse_component(s: &str) -> Result<(String, String)> {
    let (name, level) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <crate>=<level>, got {s:?}"))?;
    Ok((name.to_string(), level.to_string()))
}

#[derive(Subcommand)]
enum Commands {
    /// Sync from the node and serve queries until interrupted
    Run(cmd_run::RunArgs),

    /// Print the checkpoint and record count of a database
    Status {
        /// SQLite database path
        #[arg(long, env = "GNOINDEX_DB", default_value = "./data/tx_index.db")]
        db: String,
    },

    /// Print version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            init_tracing(&cli.log.to_config());
            cmd_run::run(args).await
        }
        Commands::Status { db } => cmd_status::run(&db).await,
        Commands::Version => {
            println!("gnoindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

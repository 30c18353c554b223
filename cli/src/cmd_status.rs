//! `gnoindex status`: inspect a database without a node.

use anyhow::{Context, Result};
use gnoindex_core::CheckpointStore;
use gnoindex_storage::SqliteStorage;

pub async fn run(db: &str) -> Result<()> {
    let store = SqliteStorage::open(db)
        .await
        .with_context(|| format!("opening database {db}"))?;

    let checkpoint = store.load().await?;
    let txs = store.tx_count().await?;
    let attributes = store.attribute_count().await?;

    println!("gnoindex database: {db}");
    match checkpoint {
        Some(h) => println!("  last indexed height: {h}"),
        None => println!("  last indexed height: none"),
    }
    println!("  transactions:        {txs}");
    println!("  attribute entries:   {attributes}");
    Ok(())
}

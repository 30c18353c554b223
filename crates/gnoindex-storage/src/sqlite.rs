//! SQLite storage backend for gnoindex.
//!
//! Persists transaction records, the secondary attribute index and the
//! checkpoint to a single SQLite file. Uses `sqlx` with WAL mode so queries
//! can read while the sync engine writes.
//!
//! # Usage
//! ```rust,no_run
//! use gnoindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./tx_index.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use gnoindex_core::checkpoint::{parse_height, CheckpointStore, LAST_HEIGHT_KEY};
use gnoindex_core::error::IndexerError;
use gnoindex_core::{ExecResult, Query, TxHash, TxRecord, TxStore};

use crate::plan::{plan, Scan};

const SELECT_TX: &str = "SELECT t.height, t.idx, t.tx, t.result FROM txs t";

/// SQLite-backed transaction index and checkpoint store.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./tx_index.db"`) or a full
    /// SQLite URL (`"sqlite:./tx_index.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every pooled connection would get its own private `:memory:`
    /// database, so the pool is pinned to one connection. All data is lost
    /// when the pool is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        // Primary records, one per (height, idx)
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS txs (
                height INTEGER NOT NULL,
                idx    INTEGER NOT NULL,
                hash   TEXT    NOT NULL,
                tx     BLOB    NOT NULL,
                result TEXT    NOT NULL,
                PRIMARY KEY (height, idx)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_txs_hash ON txs (hash);")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        // Secondary index over indexed event attributes
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tx_attributes (
                composite_key TEXT    NOT NULL,
                value         TEXT    NOT NULL,
                height        INTEGER NOT NULL,
                idx           INTEGER NOT NULL,
                PRIMARY KEY (composite_key, value, height, idx)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tx_attributes_pos ON tx_attributes (height, idx);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoint (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Total number of stored records.
    pub async fn tx_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM txs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    /// Number of secondary index entries.
    pub async fn attribute_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM tx_attributes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    // ─── Scans ──────────────────────────────────────────────────────────────────

    async fn scan(&self, scan: Scan) -> Result<Vec<SqliteRow>, IndexerError> {
        let rows = match scan {
            Scan::Empty => return Ok(Vec::new()),
            Scan::Hash(hash) => {
                sqlx::query(&format!("{SELECT_TX} WHERE t.hash = ?"))
                    .bind(hash.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            Scan::Height(lo, hi) => {
                sqlx::query(&format!("{SELECT_TX} WHERE t.height BETWEEN ? AND ?"))
                    .bind(to_i64(lo))
                    .bind(to_i64(hi))
                    .fetch_all(&self.pool)
                    .await
            }
            Scan::Index(lo, hi) => {
                sqlx::query(&format!("{SELECT_TX} WHERE t.idx BETWEEN ? AND ?"))
                    .bind(to_i64(lo))
                    .bind(to_i64(hi))
                    .fetch_all(&self.pool)
                    .await
            }
            Scan::AttributeValue { key, value } => {
                sqlx::query(&format!(
                    "{SELECT_TX} WHERE EXISTS (
                        SELECT 1 FROM tx_attributes a
                        WHERE a.composite_key = ? AND a.value = ?
                          AND a.height = t.height AND a.idx = t.idx)"
                ))
                .bind(key)
                .bind(value)
                .fetch_all(&self.pool)
                .await
            }
            Scan::AttributeKey(key) => {
                sqlx::query(&format!(
                    "{SELECT_TX} WHERE EXISTS (
                        SELECT 1 FROM tx_attributes a
                        WHERE a.composite_key = ?
                          AND a.height = t.height AND a.idx = t.idx)"
                ))
                .bind(key)
                .fetch_all(&self.pool)
                .await
            }
        };
        rows.map_err(|e| IndexerError::Storage(e.to_string()))
    }
}

fn to_i64(n: u64) -> i64 {
    n.min(i64::MAX as u64) as i64
}

fn decode_row(row: &SqliteRow) -> Result<TxRecord, IndexerError> {
    let height: i64 = row.try_get("height").map_err(|e| IndexerError::Storage(e.to_string()))?;
    let idx: i64 = row.try_get("idx").map_err(|e| IndexerError::Storage(e.to_string()))?;
    let tx: Vec<u8> = row.try_get("tx").map_err(|e| IndexerError::Storage(e.to_string()))?;
    let result: String = row.try_get("result").map_err(|e| IndexerError::Storage(e.to_string()))?;
    let result: ExecResult = serde_json::from_str(&result)
        .map_err(|e| IndexerError::Storage(format!("corrupt result at {height}/{idx}: {e}")))?;
    Ok(TxRecord::new(height as u64, idx as u32, tx, result))
}

// ─── TxStore impl ────────────────────────────────────────────────────────────

#[async_trait]
impl TxStore for SqliteStorage {
    async fn index(&self, record: &TxRecord) -> Result<(), IndexerError> {
        let result = serde_json::to_string(&record.result)
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        let height = to_i64(record.height);
        let idx = record.index as i64;

        let mut dbtx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let existing = sqlx::query("SELECT hash, tx, result FROM txs WHERE height = ? AND idx = ?")
            .bind(height)
            .bind(idx)
            .fetch_optional(&mut *dbtx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        if let Some(row) = existing {
            let same_tx = row.try_get::<Vec<u8>, _>("tx").ok().as_deref() == Some(record.tx.as_slice());
            let same_result = row.try_get::<String, _>("result").ok().as_deref() == Some(result.as_str());
            if same_tx && same_result {
                debug!(height = record.height, index = record.index, "record unchanged");
                return dbtx
                    .commit()
                    .await
                    .map_err(|e| IndexerError::Storage(e.to_string()));
            }
            sqlx::query("DELETE FROM tx_attributes WHERE height = ? AND idx = ?")
                .bind(height)
                .bind(idx)
                .execute(&mut *dbtx)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO txs (height, idx, hash, tx, result)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(height)
        .bind(idx)
        .bind(record.hash.to_string())
        .bind(record.tx.as_slice())
        .bind(&result)
        .execute(&mut *dbtx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        for event in &record.result.events {
            for (key, value) in event.indexed_attributes() {
                sqlx::query(
                    "INSERT OR IGNORE INTO tx_attributes (composite_key, value, height, idx)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(key)
                .bind(value)
                .bind(height)
                .bind(idx)
                .execute(&mut *dbtx)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
            }
        }

        dbtx.commit()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(height = record.height, index = record.index, hash = %record.hash, "tx stored");
        Ok(())
    }

    async fn get(&self, hash: &TxHash) -> Result<Option<TxRecord>, IndexerError> {
        let row = sqlx::query(&format!(
            "{SELECT_TX} WHERE t.hash = ? ORDER BY t.height DESC, t.idx DESC LIMIT 1"
        ))
        .bind(hash.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn search(&self, query: &Query) -> Result<Vec<TxRecord>, IndexerError> {
        let rows = self.scan(plan(query)).await?;
        let mut found = Vec::new();
        for row in &rows {
            let record = decode_row(row)?;
            if query.matches(&record) {
                found.push(record);
            }
        }
        Ok(found)
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(&self) -> Result<Option<u64>, IndexerError> {
        let row = sqlx::query("SELECT value FROM checkpoint WHERE key = ?")
            .bind(LAST_HEIGHT_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        row.map(|r| parse_height(&r.get::<String, _>("value"))).transpose()
    }

    async fn save(&self, height: u64) -> Result<(), IndexerError> {
        sqlx::query("INSERT OR REPLACE INTO checkpoint (key, value) VALUES (?, ?)")
            .bind(LAST_HEIGHT_KEY)
            .bind(height.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(height, "checkpoint saved");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

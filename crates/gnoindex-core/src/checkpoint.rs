//! Checkpoint manager: persists the indexer's position for crash recovery.
//!
//! The checkpoint is the height through which every transaction has been
//! written. It only moves forward, and only after a whole block is in the
//! store, so a restart always resumes from a block boundary.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::IndexerError;

/// Well-known key the checkpoint is stored under.
pub const LAST_HEIGHT_KEY: &str = "last_height";

/// Trait for storing and loading the checkpoint.
///
/// Implementations include `MemoryStorage` and `SqliteStorage`, which keep
/// the checkpoint next to the records it covers.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the persisted height, if any.
    async fn load(&self) -> Result<Option<u64>, IndexerError>;

    /// Persist `height`. Must be durable when this returns.
    async fn save(&self, height: u64) -> Result<(), IndexerError>;
}

/// Parse a checkpoint value stored as a decimal string.
pub fn parse_height(raw: &str) -> Result<u64, IndexerError> {
    raw.trim()
        .parse()
        .map_err(|e| IndexerError::Storage(format!("corrupt {LAST_HEIGHT_KEY} value {raw:?}: {e}")))
}

/// Owns the in-memory checkpoint and keeps it in step with the store.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    height: Option<u64>,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store, height: None }
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&mut self) -> Result<Option<u64>, IndexerError> {
        self.height = self.store.load().await?;
        Ok(self.height)
    }

    /// Current checkpoint as last loaded or saved.
    pub fn height(&self) -> Option<u64> {
        self.height
    }

    /// The next height to index: one past the checkpoint, or `start_height`
    /// when there is none.
    pub fn next_height(&self, start_height: u64) -> u64 {
        match self.height {
            Some(h) => h + 1,
            None => start_height,
        }
    }

    /// Advance to `height` and persist it before returning.
    ///
    /// Heights at or below the current checkpoint are ignored.
    pub async fn advance(&mut self, height: u64) -> Result<(), IndexerError> {
        if self.height.is_some_and(|h| height <= h) {
            tracing::debug!(height, current = ?self.height, "checkpoint not advanced");
            return Ok(());
        }
        self.store.save(height).await?;
        self.height = Some(height);
        Ok(())
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    height: Mutex<Option<u64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<u64>, IndexerError> {
        Ok(*self.height.lock().map_err(|e| IndexerError::Storage(e.to_string()))?)
    }

    async fn save(&self, height: u64) -> Result<(), IndexerError> {
        *self.height.lock().map_err(|e| IndexerError::Storage(e.to_string()))? = Some(height);
        Ok(())
    }
}

//! Sync configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the sync engine and its supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// First height to index when no checkpoint exists.
    pub start_height: u64,
    /// Sleep between catch-up passes once the node's head is reached (milliseconds).
    pub poll_interval_ms: u64,
    /// Delay before the supervisor restarts a failed cycle (milliseconds).
    pub restart_delay_ms: u64,
    /// Capacity of the indexed-tx broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_height: 1,
            poll_interval_ms: 6_000,
            restart_delay_ms: 6_000,
            broadcast_capacity: 1024,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Runtime state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Loading (or default-initialising) the checkpoint.
    Init,
    /// Indexing heights up to the node's latest block.
    Catchup,
    /// Caught up; waiting for the next poll.
    Idle,
    /// Stopped after cancellation or a failed cycle.
    Stopped,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Catchup => write!(f, "catchup"),
            Self::Idle => write!(f, "idle"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

//! Shared types for the indexing pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::QueryError;

// ─── TxHash ───────────────────────────────────────────────────────────────────

/// SHA-256 digest of a transaction's raw bytes.
///
/// Displays as upper-case hex; parses from hex in either case, with or
/// without a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Hash raw transaction bytes.
    pub fn of(tx: &[u8]) -> Self {
        Self(Sha256::digest(tx).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

impl FromStr for TxHash {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| QueryError::InvalidHash(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| QueryError::InvalidHash(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self(arr))
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// One key/value pair of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    /// Searchable under `"<event type>.<key>"` when set.
    #[serde(default)]
    pub index: bool,
}

impl EventAttribute {
    /// An attribute that is stored and searchable.
    pub fn indexed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), index: true }
    }

    /// An attribute that is stored but not searchable.
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), index: false }
    }
}

/// A structured event derived from a transaction message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    pub fn new(kind: impl Into<String>, attributes: Vec<EventAttribute>) -> Self {
        Self { kind: kind.into(), attributes }
    }

    /// Indexed attributes as `("<type>.<key>", value)` pairs, in order.
    pub fn indexed_attributes(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.index)
            .map(move |a| (format!("{}.{}", self.kind, a.key), a.value.as_str()))
    }
}

// ─── Block data from the node ─────────────────────────────────────────────────

/// Execution outcome of one transaction as reported by the node's
/// `block_results`, aligned by index with the block's raw tx list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverTx {
    /// Set when execution failed.
    pub error: Option<String>,
    pub data: Vec<u8>,
    pub log: String,
    pub info: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
}

impl DeliverTx {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

// ─── TxRecord ─────────────────────────────────────────────────────────────────

/// Stored execution result of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// `0` on success, non-zero when the node reported an error.
    pub code: u32,
    pub data: Vec<u8>,
    pub log: String,
    pub info: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub events: Vec<Event>,
}

impl ExecResult {
    /// Build the stored result from the node's outcome and the derived events.
    pub fn from_deliver_tx(res: DeliverTx, events: Vec<Event>) -> Self {
        Self {
            code: if res.is_err() { 1 } else { 0 },
            data: res.data,
            log: res.log,
            info: res.info,
            gas_wanted: res.gas_wanted,
            gas_used: res.gas_used,
            events,
        }
    }
}

/// One indexed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub hash: TxHash,
    pub height: u64,
    /// Position within the block (0-based).
    pub index: u32,
    pub tx: Vec<u8>,
    pub result: ExecResult,
}

impl TxRecord {
    /// Create a record; the hash is derived from `tx`.
    pub fn new(height: u64, index: u32, tx: Vec<u8>, result: ExecResult) -> Self {
        Self {
            hash: TxHash::of(&tx),
            height,
            index,
            tx,
            result,
        }
    }

    /// `(height, index)`: the record's position in the chain.
    pub fn position(&self) -> (u64, u32) {
        (self.height, self.index)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

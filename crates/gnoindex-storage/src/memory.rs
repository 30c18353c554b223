//! In-memory storage backend.
//!
//! Keeps records, the secondary attribute index and the checkpoint in
//! ordered maps behind a single lock. Useful for tests and short-lived
//! indexers that don't need persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use gnoindex_core::checkpoint::CheckpointStore;
use gnoindex_core::error::IndexerError;
use gnoindex_core::{Query, TxHash, TxRecord, TxStore};

use crate::plan::{plan, Scan};

type Position = (u64, u32);

#[derive(Default)]
struct Keyspace {
    records: BTreeMap<Position, TxRecord>,
    /// Identical tx bytes at several positions share a hash.
    hashes: BTreeMap<TxHash, BTreeSet<Position>>,
    /// `(composite key, value, height, index)`
    attributes: BTreeSet<(String, String, u64, u32)>,
    last_height: Option<u64>,
}

impl Keyspace {
    fn remove_secondaries(&mut self, old: &TxRecord) {
        let pos = old.position();
        if let Some(positions) = self.hashes.get_mut(&old.hash) {
            positions.remove(&pos);
            if positions.is_empty() {
                self.hashes.remove(&old.hash);
            }
        }
        for event in &old.result.events {
            for (key, value) in event.indexed_attributes() {
                self.attributes.remove(&(key, value.to_string(), pos.0, pos.1));
            }
        }
    }

    fn candidates(&self, scan: Scan) -> BTreeSet<Position> {
        match scan {
            Scan::Empty => BTreeSet::new(),
            Scan::Hash(hash) => self.hashes.get(&hash).cloned().unwrap_or_default(),
            Scan::Height(lo, hi) => self
                .records
                .range((lo, 0)..=(hi, u32::MAX))
                .map(|(pos, _)| *pos)
                .collect(),
            Scan::Index(lo, hi) => self
                .records
                .keys()
                .filter(|(_, index)| (lo..=hi).contains(&(*index as u64)))
                .copied()
                .collect(),
            Scan::AttributeValue { key, value } => self
                .attributes
                .range((key.clone(), value.clone(), 0, 0)..)
                .take_while(|(k, v, _, _)| *k == key && *v == value)
                .map(|(_, _, h, i)| (*h, *i))
                .collect(),
            Scan::AttributeKey(key) => self
                .attributes
                .range((key.clone(), String::new(), 0, 0)..)
                .take_while(|(k, _, _, _)| *k == key)
                .map(|(_, _, h, i)| (*h, *i))
                .collect(),
        }
    }
}

/// In-memory transaction index and checkpoint store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Keyspace>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Keyspace>, IndexerError> {
        self.inner.read().map_err(|e| IndexerError::Storage(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Keyspace>, IndexerError> {
        self.inner.write().map_err(|e| IndexerError::Storage(e.to_string()))
    }

    /// Total number of stored records.
    pub fn tx_count(&self) -> Result<usize, IndexerError> {
        Ok(self.read()?.records.len())
    }

    /// Number of secondary index entries.
    pub fn attribute_count(&self) -> Result<usize, IndexerError> {
        Ok(self.read()?.attributes.len())
    }

    /// Record stored at `(height, index)`, if any.
    pub fn get_at(&self, height: u64, index: u32) -> Result<Option<TxRecord>, IndexerError> {
        Ok(self.read()?.records.get(&(height, index)).cloned())
    }
}

#[async_trait]
impl TxStore for MemoryStorage {
    async fn index(&self, record: &TxRecord) -> Result<(), IndexerError> {
        let mut ks = self.write()?;
        let pos = record.position();

        if let Some(existing) = ks.records.get(&pos) {
            if existing == record {
                tracing::trace!(height = pos.0, index = pos.1, "record unchanged");
                return Ok(());
            }
            let stale = existing.clone();
            ks.remove_secondaries(&stale);
        }

        for event in &record.result.events {
            for (key, value) in event.indexed_attributes() {
                ks.attributes.insert((key, value.to_string(), pos.0, pos.1));
            }
        }
        ks.hashes.entry(record.hash).or_default().insert(pos);
        ks.records.insert(pos, record.clone());
        Ok(())
    }

    async fn get(&self, hash: &TxHash) -> Result<Option<TxRecord>, IndexerError> {
        let ks = self.read()?;
        Ok(ks
            .hashes
            .get(hash)
            .and_then(|positions| positions.last())
            .and_then(|pos| ks.records.get(pos))
            .cloned())
    }

    async fn search(&self, query: &Query) -> Result<Vec<TxRecord>, IndexerError> {
        let ks = self.read()?;
        let found = ks
            .candidates(plan(query))
            .into_iter()
            .filter_map(|pos| ks.records.get(&pos))
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        Ok(found)
    }
}

#[async_trait]
impl CheckpointStore for MemoryStorage {
    async fn load(&self) -> Result<Option<u64>, IndexerError> {
        Ok(self.read()?.last_height)
    }

    async fn save(&self, height: u64) -> Result<(), IndexerError> {
        self.write()?.last_height = Some(height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnoindex_core::{Event, EventAttribute, ExecResult};

    fn transfer(height: u64, index: u32, from: &str, amount: &str) -> TxRecord {
        let events = vec![Event::new(
            "transfer",
            vec![
                EventAttribute::indexed("from", from),
                EventAttribute::indexed("to", "g1dest"),
                EventAttribute::plain("amount", amount),
            ],
        )];
        let tx = format!("{height}/{index}/{from}/{amount}").into_bytes();
        TxRecord::new(height, index, tx, ExecResult { events, ..Default::default() })
    }

    fn q(s: &str) -> Query {
        Query::parse(s).unwrap()
    }

    #[tokio::test]
    async fn index_and_get_by_hash() {
        let store = MemoryStorage::new();
        let rec = transfer(10, 0, "g1alice", "5ugnot");
        store.index(&rec).await.unwrap();

        assert_eq!(store.get(&rec.hash).await.unwrap(), Some(rec));
        assert!(store.get(&TxHash::of(b"missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reindexing_identical_record_is_a_noop() {
        let store = MemoryStorage::new();
        let rec = transfer(10, 0, "g1alice", "5ugnot");
        store.index(&rec).await.unwrap();
        store.index(&rec).await.unwrap();

        assert_eq!(store.tx_count().unwrap(), 1);
        assert_eq!(store.attribute_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn reindexing_position_replaces_stale_secondaries() {
        let store = MemoryStorage::new();
        let old = transfer(10, 0, "g1alice", "5ugnot");
        let new = transfer(10, 0, "g1bob", "7ugnot");
        store.index(&old).await.unwrap();
        store.index(&new).await.unwrap();

        assert_eq!(store.tx_count().unwrap(), 1);
        assert!(store.get(&old.hash).await.unwrap().is_none());
        assert!(store.search(&q("transfer.from = 'g1alice'")).await.unwrap().is_empty());
        assert_eq!(store.search(&q("transfer.from = 'g1bob'")).await.unwrap(), vec![new]);
    }

    #[tokio::test]
    async fn search_by_attribute_and_height() {
        let store = MemoryStorage::new();
        for (h, i, from) in [(10, 0, "g1a"), (10, 1, "g1b"), (11, 0, "g1a"), (12, 0, "g1a")] {
            store.index(&transfer(h, i, from, "1ugnot")).await.unwrap();
        }

        let by_sender = store.search(&q("transfer.from = 'g1a'")).await.unwrap();
        assert_eq!(by_sender.len(), 3);

        let narrowed = store.search(&q("transfer.from = 'g1a' AND tx.height > 10")).await.unwrap();
        let positions: Vec<_> = narrowed.iter().map(TxRecord::position).collect();
        assert_eq!(positions, vec![(11, 0), (12, 0)]);

        let exact = store.search(&q("tx.height = 10")).await.unwrap();
        assert_eq!(exact.len(), 2);

        let second = store.search(&q("tx.index = 1")).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].position(), (10, 1));
    }

    #[tokio::test]
    async fn unindexed_attributes_are_not_searchable() {
        let store = MemoryStorage::new();
        store.index(&transfer(1, 0, "g1a", "5ugnot")).await.unwrap();

        assert!(store.search(&q("transfer.amount = '5ugnot'")).await.unwrap().is_empty());
        assert!(store.search(&q("transfer.amount EXISTS")).await.unwrap().is_empty());
        assert_eq!(store.search(&q("transfer.to CONTAINS 'dest'")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_by_hash() {
        let store = MemoryStorage::new();
        let rec = transfer(3, 0, "g1a", "1ugnot");
        store.index(&rec).await.unwrap();
        store.index(&transfer(3, 1, "g1b", "1ugnot")).await.unwrap();

        let found = store.search(&q(&format!("tx.hash = '{}'", rec.hash))).await.unwrap();
        assert_eq!(found, vec![rec]);
    }

    #[tokio::test]
    async fn duplicate_tx_bytes_resolve_to_highest_position() {
        let store = MemoryStorage::new();
        let at = |height, tx: &str| TxRecord::new(height, 0, tx.as_bytes().to_vec(), ExecResult::default());
        let high = at(5, "same");
        let low = at(3, "same");
        store.index(&high).await.unwrap();
        store.index(&low).await.unwrap();

        assert_eq!(store.get(&high.hash).await.unwrap(), Some(high.clone()));
        let found = store.search(&q(&format!("tx.hash = '{}'", high.hash))).await.unwrap();
        assert_eq!(found.len(), 2);

        // Overwriting the lower duplicate keeps the hash reachable.
        store.index(&at(3, "other")).await.unwrap();
        assert_eq!(store.get(&high.hash).await.unwrap(), Some(high.clone()));
        let found = store.search(&q(&format!("tx.hash = '{}'", high.hash))).await.unwrap();
        assert_eq!(found, vec![high]);
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = MemoryStorage::new();
        assert_eq!(store.load().await.unwrap(), None);
        store.save(1000).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(1000));
    }
}

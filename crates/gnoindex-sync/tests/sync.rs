//! End-to-end sync behaviour against a scripted chain.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gnoindex_core::checkpoint::CheckpointStore;
use gnoindex_core::error::IndexerError;
use gnoindex_core::{DeliverTx, JsonTxDecoder, Query, SyncConfig, SyncState, TxHash, TxRecord, TxStore};
use gnoindex_rpc::{ChainClient, TransportError};
use gnoindex_storage::{MemoryStorage, SqliteStorage};
use gnoindex_sync::{Supervisor, SyncEngine, SyncEngineBuilder};
use serde_json::json;
use tokio_util::sync::CancellationToken;

// ─── Scripted chain ───────────────────────────────────────────────────────────

#[derive(Default)]
struct MockChain {
    blocks: Mutex<BTreeMap<u64, Vec<Vec<u8>>>>,
    /// Heights whose `block_results` report one result too few.
    short_results: Mutex<Vec<u64>>,
    /// Number of upcoming `status` calls that fail.
    failing_status: AtomicUsize,
    results_calls: AtomicUsize,
}

impl MockChain {
    fn with_blocks(blocks: Vec<(u64, Vec<Vec<u8>>)>) -> Arc<Self> {
        let chain = Self::default();
        *chain.blocks.lock().unwrap() = blocks.into_iter().collect();
        Arc::new(chain)
    }

    fn push_block(&self, height: u64, txs: Vec<Vec<u8>>) {
        self.blocks.lock().unwrap().insert(height, txs);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn status(&self) -> Result<u64, TransportError> {
        if self
            .failing_status
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Http("connection refused".into()));
        }
        Ok(self.blocks.lock().unwrap().keys().next_back().copied().unwrap_or(0))
    }

    async fn block(&self, height: u64) -> Result<Vec<Vec<u8>>, TransportError> {
        Ok(self.blocks.lock().unwrap().get(&height).cloned().unwrap_or_default())
    }

    async fn block_results(&self, height: u64) -> Result<Vec<DeliverTx>, TransportError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        let txs = self.blocks.lock().unwrap().get(&height).cloned().unwrap_or_default();
        let mut results: Vec<DeliverTx> = txs
            .iter()
            .enumerate()
            .map(|(i, _)| DeliverTx {
                error: (i % 2 == 1).then(|| "insufficient funds".to_string()),
                gas_wanted: 100,
                gas_used: 50 + i as i64,
                ..Default::default()
            })
            .collect();
        if self.short_results.lock().unwrap().contains(&height) {
            results.pop();
        }
        Ok(results)
    }
}

// ─── Failing store wrapper ────────────────────────────────────────────────────

/// Delegates to a `MemoryStorage`, failing every `index` call from the
/// `fail_from`-th one (0-based) until healed.
struct FlakyStore {
    inner: MemoryStorage,
    calls: AtomicUsize,
    fail_from: AtomicUsize,
}

impl FlakyStore {
    fn failing_from(n: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStorage::new(),
            calls: AtomicUsize::new(0),
            fail_from: AtomicUsize::new(n),
        })
    }

    fn heal(&self) {
        self.fail_from.store(usize::MAX, Ordering::SeqCst);
    }
}

#[async_trait]
impl TxStore for FlakyStore {
    async fn index(&self, record: &TxRecord) -> Result<(), IndexerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_from.load(Ordering::SeqCst) {
            return Err(IndexerError::Storage("disk full".into()));
        }
        self.inner.index(record).await
    }

    async fn get(&self, hash: &TxHash) -> Result<Option<TxRecord>, IndexerError> {
        self.inner.get(hash).await
    }

    async fn search(&self, query: &Query) -> Result<Vec<TxRecord>, IndexerError> {
        self.inner.search(query).await
    }
}

#[async_trait]
impl CheckpointStore for FlakyStore {
    async fn load(&self) -> Result<Option<u64>, IndexerError> {
        self.inner.load().await
    }

    async fn save(&self, height: u64) -> Result<(), IndexerError> {
        self.inner.save(height).await
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn send_tx(from: &str, to: &str, amount: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "msg": [{"@type": "/bank.MsgSend", "from_address": from, "to_address": to, "amount": amount}],
        "fee": {"gas_wanted": "100", "gas_fee": "1ugnot"},
        "memo": ""
    }))
    .unwrap()
}

fn sample_chain() -> Arc<MockChain> {
    MockChain::with_blocks(vec![
        (1, vec![send_tx("g1a", "g1b", "1ugnot")]),
        (2, vec![]),
        (3, vec![send_tx("g1a", "g1c", "2ugnot"), send_tx("g1b", "g1c", "3ugnot")]),
        (4, vec![send_tx("g1c", "g1a", "4ugnot")]),
    ])
}

fn config() -> SyncConfig {
    SyncConfig {
        start_height: 1,
        poll_interval_ms: 10,
        restart_delay_ms: 10,
        broadcast_capacity: 64,
    }
}

fn engine<S>(chain: Arc<MockChain>, store: Arc<S>) -> SyncEngine<Arc<MockChain>>
where
    S: TxStore + CheckpointStore + 'static,
{
    let checkpoints: Arc<dyn CheckpointStore> = store.clone();
    SyncEngine::new(
        config(),
        chain,
        Arc::new(JsonTxDecoder::new()),
        store,
        checkpoints,
        CancellationToken::new(),
    )
}

async fn positions(store: &MemoryStorage, q: &str) -> Vec<(u64, u32)> {
    let mut found: Vec<_> = store
        .search(&Query::parse(q).unwrap())
        .await
        .unwrap()
        .iter()
        .map(TxRecord::position)
        .collect();
    found.sort();
    found
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn catches_up_to_latest_height() {
    let chain = sample_chain();
    let store = Arc::new(MemoryStorage::new());
    let mut engine = engine(chain.clone(), store.clone());

    let reached = engine.run_cycle().await.unwrap();

    assert_eq!(reached, 4);
    assert_eq!(store.load().await.unwrap(), Some(4));
    assert_eq!(store.tx_count().unwrap(), 4);
    assert_eq!(engine.state(), SyncState::Catchup);

    // Empty block 2 never asks for results.
    assert_eq!(chain.results_calls.load(Ordering::SeqCst), 3);

    assert_eq!(positions(&store, "transfer.from = 'g1a'").await, vec![(1, 0), (3, 0)]);
    assert_eq!(positions(&store, "message.action = 'transfer'").await.len(), 4);
}

#[tokio::test]
async fn records_carry_execution_outcome() {
    let chain = sample_chain();
    let store = Arc::new(MemoryStorage::new());
    engine(chain, store.clone()).run_cycle().await.unwrap();

    let ok = store.get_at(3, 0).unwrap().unwrap();
    let failed = store.get_at(3, 1).unwrap().unwrap();
    assert_eq!(ok.result.code, 0);
    assert_eq!(failed.result.code, 1);
    assert_eq!(failed.result.gas_used, 51);
    assert_eq!(ok.hash, TxHash::of(&send_tx("g1a", "g1c", "2ugnot")));
    assert_eq!(ok.result.events.len(), 2);
}

#[tokio::test]
async fn honours_start_height_and_resumes_from_checkpoint() {
    let chain = sample_chain();
    let store = Arc::new(MemoryStorage::new());

    let mut e = SyncEngine::new(
        SyncConfig { start_height: 3, ..config() },
        chain.clone(),
        Arc::new(JsonTxDecoder::new()),
        store.clone(),
        store.clone() as Arc<dyn CheckpointStore>,
        CancellationToken::new(),
    );
    e.run_cycle().await.unwrap();
    assert!(store.get_at(1, 0).unwrap().is_none());
    assert_eq!(store.tx_count().unwrap(), 3);

    chain.push_block(5, vec![send_tx("g1z", "g1a", "9ugnot")]);
    let mut resumed = engine(chain, store.clone());
    assert_eq!(resumed.run_cycle().await.unwrap(), 5);
    // Height 1 is below the checkpoint and stays unindexed.
    assert!(store.get_at(1, 0).unwrap().is_none());
    assert!(store.get_at(5, 0).unwrap().is_some());
}

#[tokio::test]
async fn reindexing_the_same_blocks_is_idempotent() {
    let chain = sample_chain();
    let store = Arc::new(MemoryStorage::new());
    engine(chain.clone(), store.clone()).run_cycle().await.unwrap();
    let before = store.search(&Query::parse("tx.height > 0").unwrap()).await.unwrap();
    let attrs_before = store.attribute_count().unwrap();

    // Forget the checkpoint and index everything again.
    let fresh_checkpoint: Arc<dyn CheckpointStore> = Arc::new(MemoryStorage::new());
    let mut again = SyncEngine::new(
        config(),
        chain,
        Arc::new(JsonTxDecoder::new()),
        store.clone(),
        fresh_checkpoint,
        CancellationToken::new(),
    );
    again.run_cycle().await.unwrap();

    let mut after = store.search(&Query::parse("tx.height > 0").unwrap()).await.unwrap();
    let mut before = before;
    before.sort_by_key(TxRecord::position);
    after.sort_by_key(TxRecord::position);
    assert_eq!(before, after);
    assert_eq!(store.attribute_count().unwrap(), attrs_before);
}

#[tokio::test]
async fn failure_mid_block_resumes_without_gaps_or_duplicates() {
    let chain = sample_chain();
    // Writes: (1,0) ok, (3,0) ok, (3,1) fails.
    let store = FlakyStore::failing_from(2);

    let err = engine(chain.clone(), store.clone()).run_cycle().await.unwrap_err();
    assert!(err.is_fatal());
    // Block 3 was not completed, so the checkpoint stops at 2.
    assert_eq!(store.load().await.unwrap(), Some(2));
    assert!(store.inner.get_at(3, 0).unwrap().is_some());
    assert!(store.inner.get_at(3, 1).unwrap().is_none());

    store.heal();
    engine(chain, store.clone()).run_cycle().await.unwrap();

    assert_eq!(store.inner.tx_count().unwrap(), 4);
    assert_eq!(store.load().await.unwrap(), Some(4));
    let block3 = store.inner.search(&Query::parse("tx.height = 3").unwrap()).await.unwrap();
    assert_eq!(block3.len(), 2);
}

#[tokio::test]
async fn checkpoint_never_regresses_across_restarts() {
    let chain = sample_chain();
    let store = Arc::new(MemoryStorage::new());
    let mut seen = Vec::new();

    for extra in 5..8 {
        engine(chain.clone(), store.clone()).run_cycle().await.unwrap();
        seen.push(store.load().await.unwrap().unwrap());
        chain.push_block(extra, vec![]);
    }
    assert_eq!(seen, vec![4, 5, 6]);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn misaligned_results_abort_before_checkpoint() {
    let chain = sample_chain();
    chain.short_results.lock().unwrap().push(3);
    let store = Arc::new(MemoryStorage::new());

    let err = engine(chain, store.clone()).run_cycle().await.unwrap_err();
    assert!(matches!(
        err,
        IndexerError::MisalignedResults { height: 3, txs: 2, results: 1 }
    ));
    assert_eq!(store.load().await.unwrap(), Some(2));
    assert!(store.get_at(3, 0).unwrap().is_none());
}

#[tokio::test]
async fn undecodable_tx_reports_position() {
    let chain = MockChain::with_blocks(vec![(1, vec![send_tx("g1a", "g1b", "1ugnot"), b"not json".to_vec()])]);
    let store = Arc::new(MemoryStorage::new());

    let err = engine(chain, store.clone()).run_cycle().await.unwrap_err();
    assert!(matches!(err, IndexerError::Decode { height: 1, index: 1, .. }));
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn unknown_messages_are_indexed_without_events() {
    let tx = serde_json::to_vec(&json!({"msg": [{"@type": "/gov.MsgVote", "voter": "g1a"}]})).unwrap();
    let chain = MockChain::with_blocks(vec![(1, vec![tx])]);
    let store = Arc::new(MemoryStorage::new());

    engine(chain, store.clone()).run_cycle().await.unwrap();
    let rec = store.get_at(1, 0).unwrap().unwrap();
    assert!(rec.result.events.is_empty());
}

#[tokio::test]
async fn subscribers_receive_records_in_order() {
    let chain = sample_chain();
    let store = Arc::new(MemoryStorage::new());
    let mut engine = engine(chain, store);
    let mut rx = engine.subscribe();

    engine.run_cycle().await.unwrap();

    let mut got = Vec::new();
    while let Ok(rec) = rx.try_recv() {
        got.push(rec.position());
    }
    assert_eq!(got, vec![(1, 0), (3, 0), (3, 1), (4, 0)]);
}

#[tokio::test]
async fn run_stops_cleanly_on_cancel() {
    let chain = sample_chain();
    let store = Arc::new(MemoryStorage::new());
    let mut engine = engine(chain.clone(), store.clone());
    let cancel = engine.cancel_token();
    let mut state = engine.watch_state();

    let handle = tokio::spawn(async move {
        let res = engine.run().await;
        (res, engine.state())
    });

    // Wait until the first pass is done and the engine is idling.
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == SyncState::Idle))
        .await
        .unwrap()
        .unwrap();
    chain.push_block(5, vec![send_tx("g1q", "g1r", "1ugnot")]);
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.load().await.unwrap() != Some(5) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    let (res, final_state) = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(res.is_ok());
    assert_eq!(final_state, SyncState::Stopped);
}

#[tokio::test]
async fn supervisor_restarts_after_node_errors() {
    let chain = sample_chain();
    chain.failing_status.store(2, Ordering::SeqCst);
    let store = Arc::new(MemoryStorage::new());
    let cancel = CancellationToken::new();

    let engine = SyncEngineBuilder::new()
        .config(config())
        .max_retries(Some(0))
        .cancel_token(cancel.clone())
        .build(chain, Arc::new(JsonTxDecoder::new()), store.clone());
    let handle = tokio::spawn(Supervisor::new(engine).run());

    tokio::time::timeout(Duration::from_secs(5), async {
        while store.load().await.unwrap() != Some(4) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    let res = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(res.is_ok());
    assert_eq!(store.tx_count().unwrap(), 4);
}

#[tokio::test]
async fn supervisor_halts_on_storage_errors() {
    let chain = sample_chain();
    let store = FlakyStore::failing_from(0);

    let engine = SyncEngineBuilder::new()
        .config(config())
        .build(chain, Arc::new(JsonTxDecoder::new()), store.clone());
    let res = tokio::time::timeout(Duration::from_secs(5), Supervisor::new(engine).run())
        .await
        .unwrap();

    assert!(matches!(res, Err(IndexerError::Storage(_))));
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_index_serves_searches_while_syncing() {
    let chain = sample_chain();
    let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let mut engine = engine(chain.clone(), store.clone());
    let cancel = engine.cancel_token();
    let sync = tokio::spawn(async move { engine.run().await });

    // Readers race the writer and must only ever see whole records.
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                let query = Query::parse("message.action = 'transfer'").unwrap();
                let mut seen = Vec::new();
                loop {
                    let found = store.search(&query).await.unwrap();
                    for rec in &found {
                        assert_eq!(rec.result.events.len(), 2);
                        assert_eq!(rec.hash, TxHash::of(&rec.tx));
                    }
                    seen.push(found.len());
                    if found.len() == 4 {
                        return seen;
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        })
        .collect();

    for reader in readers {
        let seen = tokio::time::timeout(Duration::from_secs(5), reader).await.unwrap().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "result counts went backwards: {seen:?}");
    }

    chain.push_block(5, vec![send_tx("g1q", "g1r", "1ugnot")]);
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.load().await.unwrap() != Some(5) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    assert!(tokio::time::timeout(Duration::from_secs(5), sync).await.unwrap().unwrap().is_ok());
    assert_eq!(store.tx_count().await.unwrap(), 5);

    let found = store.search(&Query::parse("transfer.from = 'g1a'").unwrap()).await.unwrap();
    let mut got: Vec<_> = found.iter().map(TxRecord::position).collect();
    got.sort();
    assert_eq!(got, vec![(1, 0), (3, 0)]);
    let failed = store.get(&TxHash::of(&send_tx("g1b", "g1c", "3ugnot"))).await.unwrap().unwrap();
    assert_eq!(failed.position(), (3, 1));
    assert_eq!(failed.result.code, 1);
}

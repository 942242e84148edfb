use clap::Parser;
use kvstress::client::{
    encode_values, ClientEngine, ProportionalGroupBuilder, SingleOpBuilder,
};
use kvstress::random::rng_for_thread;
use kvstress::store::{StoreResult, StoreStatus, TableId, TxnStore};
use kvstress::workload::{CoreWorkload, WorkloadState, YcsbConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Answers every transactional read with a canned record and fails the
/// first `failures` commits with the scripted status, logging the key of
/// every operation so attempts can be compared.
struct ScriptedStore {
    failures_left: AtomicU32,
    commit_failure: StoreStatus,
    record: Vec<u8>,
    keys_touched: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedStore {
    fn new(failures: u32, commit_failure: StoreStatus) -> Self {
        let record =
            encode_values(&[("field0".to_string(), "payload".to_string())]).unwrap();
        ScriptedStore {
            failures_left: AtomicU32::new(failures),
            commit_failure,
            record,
            keys_touched: Mutex::new(Vec::new()),
        }
    }

    fn touch(&self, key: &[u8]) {
        self.keys_touched.lock().unwrap().push(key.to_vec());
    }

    fn touched(&self) -> Vec<Vec<u8>> {
        self.keys_touched.lock().unwrap().clone()
    }
}

impl TxnStore for ScriptedStore {
    type TxnHandle = ();

    fn create_table(&self, _name: &str) -> StoreResult<TableId> {
        Ok(0)
    }

    fn begin_txn(&self) -> StoreResult<()> {
        Ok(())
    }

    fn commit_txn(&self, _txn: &()) -> StoreResult<()> {
        let left = self.failures_left.load(Ordering::Relaxed);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::Relaxed);
            return Err(self.commit_failure.clone());
        }
        Ok(())
    }

    fn abort_txn(&self, _txn: &()) -> StoreResult<()> {
        Ok(())
    }

    fn get(&self, _txn: &(), _table: TableId, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.touch(key);
        Ok(self.record.clone())
    }

    fn update(&self, _txn: &(), _table: TableId, key: &[u8], _value: Vec<u8>) -> StoreResult<()> {
        self.touch(key);
        Ok(())
    }

    fn insert(&self, _txn: &(), _table: TableId, key: Vec<u8>, _value: Vec<u8>) -> StoreResult<()> {
        self.touch(&key);
        Ok(())
    }

    fn delete(&self, _txn: &(), _table: TableId, key: &[u8]) -> StoreResult<()> {
        self.touch(key);
        Ok(())
    }

    // Single-operation tests read through the raw path.
    fn raw_get(&self, _table: TableId, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.touch(key);
        Err(StoreStatus::KeyNotFound)
    }
}

fn config(max_txn_retry: u32) -> YcsbConfig {
    YcsbConfig::parse_from([
        "ycsb",
        "--record-count",
        "100",
        "--request-distribution",
        "uniform",
        "--read-proportion",
        "0.5",
        "--update-proportion",
        "0.5",
        "--ops-per-transaction",
        "4",
        "--min-abort-penalty-us",
        "0",
        "--max-txn-retry",
        &max_txn_retry.to_string(),
    ])
}

#[test]
fn test_conflicted_transaction_retries_identical_operations() {
    let cfg = config(10);
    let store = ScriptedStore::new(3, StoreStatus::Conflict);
    let state = WorkloadState::new(&cfg);
    let mut workload = CoreWorkload::new(&cfg, &state, 0).unwrap();
    let mut rng = rng_for_thread(0);
    let mut engine = ClientEngine::new(
        &store,
        Box::new(ProportionalGroupBuilder::new(cfg.ops_per_transaction)),
        cfg.min_abort_penalty_us,
        cfg.max_txn_retry,
    );

    assert!(engine.do_transaction(&mut workload, &mut rng).unwrap());
    assert_eq!(engine.stats.committed, 1);
    assert_eq!(engine.stats.aborted, 3);
    assert_eq!(engine.stats.retries_per_txn, vec![3]);
    assert_eq!(engine.stats.commit_latencies_us.len(), 1);
    assert!(engine.stats.abort_latencies_us.is_empty());

    // Three conflicted attempts plus the committed one replay the same
    // operation set in the same order.
    let touched = store.touched();
    assert_eq!(touched.len() % 4, 0);
    let per_attempt = touched.len() / 4;
    assert!(per_attempt > 0);
    for attempt in touched.chunks(per_attempt).skip(1) {
        assert_eq!(attempt, &touched[..per_attempt]);
    }
}

#[test]
fn test_exhausted_retries_count_as_one_failed_transaction() {
    let cfg = config(2);
    let store = ScriptedStore::new(u32::MAX, StoreStatus::Conflict);
    let state = WorkloadState::new(&cfg);
    let mut workload = CoreWorkload::new(&cfg, &state, 0).unwrap();
    let mut rng = rng_for_thread(0);
    let mut engine = ClientEngine::new(
        &store,
        Box::new(ProportionalGroupBuilder::new(cfg.ops_per_transaction)),
        cfg.min_abort_penalty_us,
        cfg.max_txn_retry,
    );

    assert!(!engine.do_transaction(&mut workload, &mut rng).unwrap());
    assert_eq!(engine.stats.committed, 0);
    assert_eq!(engine.stats.aborted, 3);
    assert_eq!(engine.stats.retries_per_txn, vec![3]);
    assert!(engine.stats.commit_latencies_us.is_empty());
    assert_eq!(engine.stats.abort_latencies_us.len(), 1);
}

#[test]
fn test_non_retryable_commit_error_propagates() {
    let cfg = config(10);
    let store = ScriptedStore::new(1, StoreStatus::Error("injected".to_string()));
    let state = WorkloadState::new(&cfg);
    let mut workload = CoreWorkload::new(&cfg, &state, 0).unwrap();
    let mut rng = rng_for_thread(0);
    let mut engine = ClientEngine::new(
        &store,
        Box::new(ProportionalGroupBuilder::new(cfg.ops_per_transaction)),
        cfg.min_abort_penalty_us,
        cfg.max_txn_retry,
    );

    assert_eq!(
        engine.do_transaction(&mut workload, &mut rng),
        Err(StoreStatus::Error("injected".to_string()))
    );
    assert_eq!(engine.stats.committed, 0);
    assert_eq!(engine.stats.aborted, 0);
    assert!(engine.stats.retries_per_txn.is_empty());
}

#[test]
fn test_single_op_missing_key_is_a_recorded_abort() {
    let cfg = YcsbConfig::parse_from([
        "ycsb",
        "--record-count",
        "100",
        "--request-distribution",
        "uniform",
        "--read-proportion",
        "1.0",
        "--update-proportion",
        "0.0",
        "--min-abort-penalty-us",
        "0",
    ]);
    let store = ScriptedStore::new(0, StoreStatus::Conflict);
    let state = WorkloadState::new(&cfg);
    let mut workload = CoreWorkload::new(&cfg, &state, 0).unwrap();
    let mut rng = rng_for_thread(0);
    let mut engine = ClientEngine::new(&store, Box::new(SingleOpBuilder), 0, 10);

    assert!(!engine.do_transaction(&mut workload, &mut rng).unwrap());
    assert_eq!(engine.stats.committed, 0);
    assert_eq!(engine.stats.aborted, 1);
    assert_eq!(engine.stats.abort_latencies_us.len(), 1);
}

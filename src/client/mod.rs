use crate::log_debug;
use crate::store::{ScanOptions, StoreResult, StoreStatus, TableId, TxnStore};
use crate::workload::CoreWorkload;
use rand::rngs::SmallRng;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

pub mod prelude {
    pub use super::{
        decode_values, encode_values, ClientEngine, ClientStats, OpKind, Operation,
        ProportionalGroupBuilder, SingleOpBuilder, TransactionBuilder,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    Update,
    Insert,
    Scan,
    ReadModifyWrite,
}

/// One logical operation against the store.
///
/// Equality and hashing cover `(table, key)` only. When a transaction draws
/// two operations on the same key, the second is dropped from the operation
/// set even if its kind differs; the configured proportions are calibrated
/// against this dedup policy.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OpKind,
    pub table: TableId,
    pub key: String,
    pub scan_length: u64,
    /// Empty means read every field.
    pub read_fields: Vec<String>,
    pub values: Vec<(String, String)>,
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && self.key == other.key
    }
}

impl Eq for Operation {}

impl Hash for Operation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.key.hash(state);
    }
}

pub fn encode_values(values: &[(String, String)]) -> StoreResult<Vec<u8>> {
    serde_cbor::to_vec(&values).map_err(StoreStatus::from)
}

pub fn decode_values(bytes: &[u8]) -> StoreResult<Vec<(String, String)>> {
    serde_cbor::from_slice(bytes).map_err(StoreStatus::from)
}

/// Produces the operation set of one transaction.
pub trait TransactionBuilder: Send {
    fn build(&mut self, workload: &mut CoreWorkload, rng: &mut SmallRng) -> Vec<Operation>;

    /// Builders returning false run their single operation outside any
    /// store transaction.
    fn transactional(&self) -> bool {
        true
    }
}

/// One operation per call, executed through the non-transactional path.
pub struct SingleOpBuilder;

impl TransactionBuilder for SingleOpBuilder {
    fn build(&mut self, workload: &mut CoreWorkload, rng: &mut SmallRng) -> Vec<Operation> {
        vec![workload.next_operation(rng)]
    }

    fn transactional(&self) -> bool {
        false
    }
}

/// Draws operations until the set holds `ops_per_transaction` distinct
/// `(table, key)` pairs.
pub struct ProportionalGroupBuilder {
    ops_per_transaction: usize,
}

impl ProportionalGroupBuilder {
    pub fn new(ops_per_transaction: usize) -> Self {
        debug_assert!(ops_per_transaction >= 1);
        ProportionalGroupBuilder {
            ops_per_transaction,
        }
    }
}

impl TransactionBuilder for ProportionalGroupBuilder {
    fn build(&mut self, workload: &mut CoreWorkload, rng: &mut SmallRng) -> Vec<Operation> {
        let mut ops = HashSet::with_capacity(self.ops_per_transaction);
        while ops.len() < self.ops_per_transaction {
            // Re-inserting an existing (table, key) keeps the first draw.
            ops.insert(workload.next_operation(rng));
        }
        ops.into_iter().collect()
    }
}

#[derive(Debug, Default)]
pub struct ClientStats {
    pub committed: u64,
    /// Conflicted attempts, counted per attempt rather than per transaction.
    pub aborted: u64,
    pub attempted: u64,
    pub commit_latencies_us: Vec<u64>,
    pub abort_latencies_us: Vec<u64>,
    pub retries_per_txn: Vec<u32>,
}

impl ClientStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn merge(&mut self, other: &ClientStats) {
        self.committed += other.committed;
        self.aborted += other.aborted;
        self.attempted += other.attempted;
        self.commit_latencies_us
            .extend_from_slice(&other.commit_latencies_us);
        self.abort_latencies_us
            .extend_from_slice(&other.abort_latencies_us);
        self.retries_per_txn.extend_from_slice(&other.retries_per_txn);
    }
}

/// Generates one transaction's operation set, executes it against the
/// store, and retries the identical set with exponential backoff when
/// commit-time validation fails.
pub struct ClientEngine<'a, S: TxnStore> {
    store: &'a S,
    builder: Box<dyn TransactionBuilder>,
    min_abort_penalty_us: u64,
    max_txn_retry: u32,
    pub stats: ClientStats,
}

impl<'a, S: TxnStore> ClientEngine<'a, S> {
    pub fn new(
        store: &'a S,
        builder: Box<dyn TransactionBuilder>,
        min_abort_penalty_us: u64,
        max_txn_retry: u32,
    ) -> Self {
        ClientEngine {
            store,
            builder,
            min_abort_penalty_us,
            max_txn_retry,
            stats: ClientStats::new(),
        }
    }

    /// Load-phase insert through the bulk path.
    pub fn do_insert(
        &mut self,
        workload: &mut CoreWorkload,
        rng: &mut SmallRng,
    ) -> StoreResult<()> {
        let key = workload.next_sequence_key(rng);
        let values = workload.build_values(rng);
        self.store
            .raw_store(workload.table(), key.into_bytes(), encode_values(&values)?)
    }

    /// Runs one transaction to commit or abort. Returns whether it
    /// committed. The latency sample covers generation plus every attempt,
    /// recorded once in the commit or abort series.
    pub fn do_transaction(
        &mut self,
        workload: &mut CoreWorkload,
        rng: &mut SmallRng,
    ) -> StoreResult<bool> {
        let start = Instant::now();
        let ops = self.builder.build(workload, rng);
        self.stats.attempted += 1;

        if !self.builder.transactional() {
            let result = self.execute_raw(&ops[0]);
            let latency = start.elapsed().as_micros() as u64;
            self.stats.retries_per_txn.push(0);
            return match result {
                Ok(()) => {
                    self.stats.committed += 1;
                    self.stats.commit_latencies_us.push(latency);
                    Ok(true)
                }
                Err(status) if is_retryable(&status) => {
                    self.stats.aborted += 1;
                    self.stats.abort_latencies_us.push(latency);
                    Ok(false)
                }
                Err(status) => Err(status),
            };
        }

        let mut retry: u32 = 0;
        let committed = loop {
            match self.execute_attempt(&ops) {
                Ok(()) => break true,
                Err(status) if is_retryable(&status) => {
                    self.stats.aborted += 1;
                    log_debug!("transaction aborted ({}), retry {}", status, retry);
                    let penalty = self
                        .min_abort_penalty_us
                        .saturating_mul(1u64 << retry.min(63));
                    if penalty > 0 {
                        std::thread::sleep(Duration::from_micros(penalty));
                    }
                    retry += 1;
                    if retry > self.max_txn_retry {
                        break false;
                    }
                }
                Err(status) => return Err(status),
            }
        };

        let latency = start.elapsed().as_micros() as u64;
        if committed {
            self.stats.committed += 1;
            self.stats.commit_latencies_us.push(latency);
        } else {
            self.stats.abort_latencies_us.push(latency);
        }
        self.stats.retries_per_txn.push(retry);
        Ok(committed)
    }

    fn execute_attempt(&mut self, ops: &[Operation]) -> StoreResult<()> {
        let txn = self.store.begin_txn()?;
        for op in ops {
            if let Err(status) = self.execute_op(&txn, op) {
                self.store.abort_txn(&txn)?;
                return Err(status);
            }
        }
        match self.store.commit_txn(&txn) {
            Ok(()) => Ok(()),
            Err(status) => {
                self.store.abort_txn(&txn)?;
                Err(status)
            }
        }
    }

    fn execute_op(&self, txn: &S::TxnHandle, op: &Operation) -> StoreResult<()> {
        match op.kind {
            OpKind::Read => {
                let bytes = self.store.get(txn, op.table, op.key.as_bytes())?;
                let fields = decode_values(&bytes)?;
                let _ = project_fields(fields, &op.read_fields);
                Ok(())
            }
            OpKind::Update => {
                self.store
                    .update(txn, op.table, op.key.as_bytes(), encode_values(&op.values)?)
            }
            OpKind::Insert => self.store.insert(
                txn,
                op.table,
                op.key.clone().into_bytes(),
                encode_values(&op.values)?,
            ),
            OpKind::Scan => {
                let rows = self.store.scan(
                    txn,
                    op.table,
                    ScanOptions::new(op.key.clone().into_bytes(), op.scan_length as usize),
                )?;
                for (_, bytes) in rows {
                    let fields = decode_values(&bytes)?;
                    let _ = project_fields(fields, &op.read_fields);
                }
                Ok(())
            }
            OpKind::ReadModifyWrite => {
                let bytes = self.store.get(txn, op.table, op.key.as_bytes())?;
                let fields = decode_values(&bytes)?;
                let _ = project_fields(fields, &op.read_fields);
                self.store.insert(
                    txn,
                    op.table,
                    op.key.clone().into_bytes(),
                    encode_values(&op.values)?,
                )
            }
        }
    }

    fn execute_raw(&self, op: &Operation) -> StoreResult<()> {
        match op.kind {
            OpKind::Read => {
                let bytes = self.store.raw_get(op.table, op.key.as_bytes())?;
                let fields = decode_values(&bytes)?;
                let _ = project_fields(fields, &op.read_fields);
                Ok(())
            }
            OpKind::Update => {
                self.store
                    .raw_update(op.table, op.key.as_bytes(), encode_values(&op.values)?)
            }
            OpKind::Insert => self.store.raw_insert(
                op.table,
                op.key.clone().into_bytes(),
                encode_values(&op.values)?,
            ),
            OpKind::Scan => {
                self.store
                    .raw_scan(
                        op.table,
                        ScanOptions::new(op.key.clone().into_bytes(), op.scan_length as usize),
                    )
                    .map(|_| ())
            }
            OpKind::ReadModifyWrite => {
                let _ = self.store.raw_get(op.table, op.key.as_bytes())?;
                self.store.raw_insert(
                    op.table,
                    op.key.clone().into_bytes(),
                    encode_values(&op.values)?,
                )
            }
        }
    }
}

/// Conflicts are retryable by definition. A missing key is retryable too:
/// batched load cursors can strand key numbers near the top of the
/// keyspace, and chasing one is an abort, not a harness bug.
fn is_retryable(status: &StoreStatus) -> bool {
    matches!(status, StoreStatus::Conflict | StoreStatus::KeyNotFound)
}

/// Projects the requested fields out of a decoded record. An empty request
/// keeps every field.
fn project_fields(
    fields: Vec<(String, String)>,
    requested: &[String],
) -> Vec<(String, String)> {
    if requested.is_empty() {
        return fields;
    }
    fields
        .into_iter()
        .filter(|(name, _)| requested.iter().any(|r| r == name))
        .collect()
}

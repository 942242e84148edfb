mod memory;

pub use memory::{MemoryStore, MemoryTxn};

pub mod prelude {
    pub use super::{
        MemoryStore, MemoryTxn, MergeOperator, ScanOptions, StoreResult, StoreStatus, TableId,
        TxnStore,
    };
}

use std::sync::Arc;

pub type TableId = u16;

pub type StoreResult<T> = Result<T, StoreStatus>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    TableNotFound,
    KeyNotFound,
    /// Commit-time validation failed; the transaction may be retried.
    Conflict,
    /// The backend does not implement this operation.
    Unsupported,
    /// A stored value failed to decode, or decoded to the wrong shape.
    InvalidRecord(String),
    Error(String),
}

impl From<StoreStatus> for String {
    fn from(status: StoreStatus) -> String {
        match status {
            StoreStatus::TableNotFound => "Table not found".to_string(),
            StoreStatus::KeyNotFound => "Key not found".to_string(),
            StoreStatus::Conflict => "Conflict".to_string(),
            StoreStatus::Unsupported => "Operation not supported".to_string(),
            StoreStatus::InvalidRecord(msg) => format!("Invalid record: {}", msg),
            StoreStatus::Error(msg) => format!("Error: {}", msg),
        }
    }
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from(self.clone()))
    }
}

impl std::error::Error for StoreStatus {}

impl From<serde_cbor::Error> for StoreStatus {
    fn from(err: serde_cbor::Error) -> StoreStatus {
        StoreStatus::InvalidRecord(err.to_string())
    }
}

/// Options for a range scan starting at `lower`, ascending key order.
/// `limit` of zero means no bound.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub lower: Vec<u8>,
    pub limit: usize,
}

impl ScanOptions {
    pub fn new(lower: Vec<u8>, limit: usize) -> Self {
        ScanOptions { lower, limit }
    }
}

/// Resolves blind-write deltas. `merge_deltas` combines two pending deltas
/// written to the same key, newest last; `apply_delta` folds an accumulated
/// delta into the full base record at commit.
pub trait MergeOperator: Send + Sync {
    fn merge_deltas(
        &self,
        table: TableId,
        key: &[u8],
        older: &[u8],
        newer: &[u8],
    ) -> StoreResult<Vec<u8>>;

    fn apply_delta(
        &self,
        table: TableId,
        key: &[u8],
        base: &[u8],
        delta: &[u8],
    ) -> StoreResult<Vec<u8>>;
}

/// Transactional KV backend surface the workload drivers run against.
///
/// `update` requires the key to exist, `insert` is a blind put, `upsert`
/// writes a delta for the merge operator to resolve. The `raw_*` family
/// bypasses transactions for single operations; `raw_store` is the bulk
/// load path.
pub trait TxnStore: Send + Sync {
    type TxnHandle;

    fn create_table(&self, name: &str) -> StoreResult<TableId>;

    fn set_merge_operator(&self, _op: Arc<dyn MergeOperator>) {}

    fn begin_txn(&self) -> StoreResult<Self::TxnHandle>;
    fn commit_txn(&self, txn: &Self::TxnHandle) -> StoreResult<()>;
    fn abort_txn(&self, txn: &Self::TxnHandle) -> StoreResult<()>;

    fn get(&self, txn: &Self::TxnHandle, table: TableId, key: &[u8]) -> StoreResult<Vec<u8>>;
    fn update(
        &self,
        txn: &Self::TxnHandle,
        table: TableId,
        key: &[u8],
        value: Vec<u8>,
    ) -> StoreResult<()>;
    fn insert(
        &self,
        txn: &Self::TxnHandle,
        table: TableId,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> StoreResult<()>;
    fn delete(&self, txn: &Self::TxnHandle, table: TableId, key: &[u8]) -> StoreResult<()>;

    fn upsert(
        &self,
        _txn: &Self::TxnHandle,
        _table: TableId,
        _key: Vec<u8>,
        _delta: Vec<u8>,
    ) -> StoreResult<()> {
        Err(StoreStatus::Unsupported)
    }

    fn scan(
        &self,
        _txn: &Self::TxnHandle,
        _table: TableId,
        _options: ScanOptions,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Err(StoreStatus::Unsupported)
    }

    fn raw_get(&self, _table: TableId, _key: &[u8]) -> StoreResult<Vec<u8>> {
        Err(StoreStatus::Unsupported)
    }
    fn raw_update(&self, _table: TableId, _key: &[u8], _value: Vec<u8>) -> StoreResult<()> {
        Err(StoreStatus::Unsupported)
    }
    fn raw_insert(&self, _table: TableId, _key: Vec<u8>, _value: Vec<u8>) -> StoreResult<()> {
        Err(StoreStatus::Unsupported)
    }
    fn raw_delete(&self, _table: TableId, _key: &[u8]) -> StoreResult<()> {
        Err(StoreStatus::Unsupported)
    }
    fn raw_scan(
        &self,
        _table: TableId,
        _options: ScanOptions,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Err(StoreStatus::Unsupported)
    }

    /// Bulk load path. No transactions, no version checks.
    fn raw_store(&self, _table: TableId, _key: Vec<u8>, _value: Vec<u8>) -> StoreResult<()> {
        Err(StoreStatus::Unsupported)
    }

    fn num_records(&self, _table: TableId) -> StoreResult<usize> {
        Err(StoreStatus::Unsupported)
    }
}

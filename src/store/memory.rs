use super::{MergeOperator, ScanOptions, StoreResult, StoreStatus, TableId, TxnStore};
use dashmap::DashMap;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

struct Versioned {
    version: u64,
    value: Vec<u8>,
}

struct Table {
    #[allow(dead_code)]
    name: String,
    rows: Mutex<BTreeMap<Vec<u8>, Versioned>>,
}

fn lock_rows(table: &Table) -> MutexGuard<'_, BTreeMap<Vec<u8>, Versioned>> {
    table.rows.lock().unwrap_or_else(|e| e.into_inner())
}

enum WriteEntry {
    Put(Vec<u8>),
    Merge(Vec<u8>),
    Delete,
}

/// Buffered read and write sets of one in-flight transaction. Read versions
/// are validated against the committed state at commit time; version zero
/// records that the key was observed absent.
pub struct MemoryTxn {
    reads: RefCell<HashMap<(TableId, Vec<u8>), u64>>,
    writes: RefCell<BTreeMap<(TableId, Vec<u8>), WriteEntry>>,
}

impl MemoryTxn {
    fn new() -> Self {
        MemoryTxn {
            reads: RefCell::new(HashMap::new()),
            writes: RefCell::new(BTreeMap::new()),
        }
    }
}

/// In-memory reference backend: per-table ordered maps with version tags,
/// optimistic commit-time validation of the read set, and pending-delta
/// resolution through the registered merge operator. Scans observe the
/// committed state, not the transaction's own buffered writes.
pub struct MemoryStore {
    tables: DashMap<TableId, Table>,
    next_table_id: AtomicU16,
    commit_seq: AtomicU64,
    merge_op: RwLock<Option<Arc<dyn MergeOperator>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            tables: DashMap::new(),
            next_table_id: AtomicU16::new(0),
            commit_seq: AtomicU64::new(0),
            merge_op: RwLock::new(None),
        }
    }

    fn merge_operator(&self) -> StoreResult<Arc<dyn MergeOperator>> {
        self.merge_op
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(StoreStatus::Unsupported)
    }

    fn with_table<R>(
        &self,
        table: TableId,
        f: impl FnOnce(&Table) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let entry = self.tables.get(&table).ok_or(StoreStatus::TableNotFound)?;
        f(entry.value())
    }

    /// Reads the committed version of a key and records it in the read set.
    fn read_committed(
        &self,
        txn: &MemoryTxn,
        table: TableId,
        key: &[u8],
    ) -> StoreResult<Option<Vec<u8>>> {
        self.with_table(table, |t| {
            let rows = lock_rows(t);
            let (version, value) = match rows.get(key) {
                Some(v) => (v.version, Some(v.value.clone())),
                None => (0, None),
            };
            txn.reads
                .borrow_mut()
                .entry((table, key.to_vec()))
                .or_insert(version);
            Ok(value)
        })
    }

    fn next_version(&self) -> u64 {
        self.commit_seq.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TxnStore for MemoryStore {
    type TxnHandle = MemoryTxn;

    fn create_table(&self, name: &str) -> StoreResult<TableId> {
        let id = self.next_table_id.fetch_add(1, Ordering::AcqRel);
        self.tables.insert(
            id,
            Table {
                name: name.to_string(),
                rows: Mutex::new(BTreeMap::new()),
            },
        );
        Ok(id)
    }

    fn set_merge_operator(&self, op: Arc<dyn MergeOperator>) {
        *self.merge_op.write().unwrap_or_else(|e| e.into_inner()) = Some(op);
    }

    fn begin_txn(&self) -> StoreResult<MemoryTxn> {
        Ok(MemoryTxn::new())
    }

    fn commit_txn(&self, txn: &MemoryTxn) -> StoreResult<()> {
        let result = self.commit_inner(txn);
        txn.reads.borrow_mut().clear();
        txn.writes.borrow_mut().clear();
        result
    }

    fn abort_txn(&self, txn: &MemoryTxn) -> StoreResult<()> {
        txn.reads.borrow_mut().clear();
        txn.writes.borrow_mut().clear();
        Ok(())
    }

    fn get(&self, txn: &MemoryTxn, table: TableId, key: &[u8]) -> StoreResult<Vec<u8>> {
        let pending = {
            let writes = txn.writes.borrow();
            match writes.get(&(table, key.to_vec())) {
                Some(WriteEntry::Put(v)) => return Ok(v.clone()),
                Some(WriteEntry::Delete) => return Err(StoreStatus::KeyNotFound),
                Some(WriteEntry::Merge(d)) => Some(d.clone()),
                None => None,
            }
        };
        let base = self
            .read_committed(txn, table, key)?
            .ok_or(StoreStatus::KeyNotFound)?;
        match pending {
            Some(delta) => self.merge_operator()?.apply_delta(table, key, &base, &delta),
            None => Ok(base),
        }
    }

    fn update(&self, txn: &MemoryTxn, table: TableId, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        let exists_pending = {
            let writes = txn.writes.borrow();
            match writes.get(&(table, key.to_vec())) {
                Some(WriteEntry::Put(_)) | Some(WriteEntry::Merge(_)) => Some(true),
                Some(WriteEntry::Delete) => Some(false),
                None => None,
            }
        };
        let exists = match exists_pending {
            Some(e) => e,
            None => self.read_committed(txn, table, key)?.is_some(),
        };
        if !exists {
            return Err(StoreStatus::KeyNotFound);
        }
        txn.writes
            .borrow_mut()
            .insert((table, key.to_vec()), WriteEntry::Put(value));
        Ok(())
    }

    fn insert(&self, txn: &MemoryTxn, table: TableId, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        if !self.tables.contains_key(&table) {
            return Err(StoreStatus::TableNotFound);
        }
        txn.writes
            .borrow_mut()
            .insert((table, key), WriteEntry::Put(value));
        Ok(())
    }

    fn delete(&self, txn: &MemoryTxn, table: TableId, key: &[u8]) -> StoreResult<()> {
        let exists = match {
            let writes = txn.writes.borrow();
            match writes.get(&(table, key.to_vec())) {
                Some(WriteEntry::Put(_)) | Some(WriteEntry::Merge(_)) => Some(true),
                Some(WriteEntry::Delete) => Some(false),
                None => None,
            }
        } {
            Some(e) => e,
            None => self.read_committed(txn, table, key)?.is_some(),
        };
        if !exists {
            return Err(StoreStatus::KeyNotFound);
        }
        txn.writes
            .borrow_mut()
            .insert((table, key.to_vec()), WriteEntry::Delete);
        Ok(())
    }

    fn upsert(&self, txn: &MemoryTxn, table: TableId, key: Vec<u8>, delta: Vec<u8>) -> StoreResult<()> {
        let op = self.merge_operator()?;
        if !self.tables.contains_key(&table) {
            return Err(StoreStatus::TableNotFound);
        }
        let mut writes = txn.writes.borrow_mut();
        let entry = writes.remove(&(table, key.clone()));
        let combined = match entry {
            None => WriteEntry::Merge(delta),
            Some(WriteEntry::Merge(older)) => {
                WriteEntry::Merge(op.merge_deltas(table, &key, &older, &delta)?)
            }
            Some(WriteEntry::Put(base)) => {
                WriteEntry::Put(op.apply_delta(table, &key, &base, &delta)?)
            }
            Some(WriteEntry::Delete) => return Err(StoreStatus::KeyNotFound),
        };
        writes.insert((table, key), combined);
        Ok(())
    }

    fn scan(
        &self,
        txn: &MemoryTxn,
        table: TableId,
        options: ScanOptions,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let limit = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        self.with_table(table, |t| {
            let rows = lock_rows(t);
            let mut reads = txn.reads.borrow_mut();
            let mut out = Vec::new();
            for (key, versioned) in
                rows.range::<Vec<u8>, _>((Bound::Included(&options.lower), Bound::Unbounded))
            {
                if out.len() >= limit {
                    break;
                }
                reads
                    .entry((table, key.clone()))
                    .or_insert(versioned.version);
                out.push((key.clone(), versioned.value.clone()));
            }
            Ok(out)
        })
    }

    fn raw_get(&self, table: TableId, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.with_table(table, |t| {
            lock_rows(t)
                .get(key)
                .map(|v| v.value.clone())
                .ok_or(StoreStatus::KeyNotFound)
        })
    }

    fn raw_update(&self, table: TableId, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        let version = self.next_version();
        self.with_table(table, |t| {
            let mut rows = lock_rows(t);
            match rows.get_mut(key) {
                Some(v) => {
                    v.version = version;
                    v.value = value;
                    Ok(())
                }
                None => Err(StoreStatus::KeyNotFound),
            }
        })
    }

    fn raw_insert(&self, table: TableId, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        let version = self.next_version();
        self.with_table(table, |t| {
            lock_rows(t).insert(key, Versioned { version, value });
            Ok(())
        })
    }

    fn raw_delete(&self, table: TableId, key: &[u8]) -> StoreResult<()> {
        self.with_table(table, |t| {
            lock_rows(t)
                .remove(key)
                .map(|_| ())
                .ok_or(StoreStatus::KeyNotFound)
        })
    }

    fn raw_scan(&self, table: TableId, options: ScanOptions) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let limit = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        self.with_table(table, |t| {
            let rows = lock_rows(t);
            Ok(rows
                .range::<Vec<u8>, _>((Bound::Included(&options.lower), Bound::Unbounded))
                .take(limit)
                .map(|(k, v)| (k.clone(), v.value.clone()))
                .collect())
        })
    }

    fn raw_store(&self, table: TableId, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        self.raw_insert(table, key, value)
    }

    fn num_records(&self, table: TableId) -> StoreResult<usize> {
        self.with_table(table, |t| Ok(lock_rows(t).len()))
    }
}

impl MemoryStore {
    fn commit_inner(&self, txn: &MemoryTxn) -> StoreResult<()> {
        let reads = txn.reads.borrow();
        let writes = txn.writes.borrow();
        if reads.is_empty() && writes.is_empty() {
            return Ok(());
        }

        let mut table_ids: Vec<TableId> = reads
            .keys()
            .map(|(t, _)| *t)
            .chain(writes.keys().map(|(t, _)| *t))
            .collect();
        table_ids.sort_unstable();
        table_ids.dedup();

        // Tables are locked in id order so concurrent commits cannot
        // deadlock against each other.
        let mut table_refs = Vec::with_capacity(table_ids.len());
        for id in &table_ids {
            table_refs.push(self.tables.get(id).ok_or(StoreStatus::TableNotFound)?);
        }
        let mut guards: HashMap<TableId, MutexGuard<'_, BTreeMap<Vec<u8>, Versioned>>> =
            HashMap::with_capacity(table_refs.len());
        for r in &table_refs {
            guards.insert(*r.key(), lock_rows(r.value()));
        }

        for ((table, key), version) in reads.iter() {
            let rows = guards.get(table).ok_or(StoreStatus::TableNotFound)?;
            let current = rows.get(key).map(|v| v.version).unwrap_or(0);
            if current != *version {
                return Err(StoreStatus::Conflict);
            }
        }
        // Merge targets must exist before anything is applied; a missing
        // base row fails the whole commit rather than half of it.
        for ((table, key), entry) in writes.iter() {
            if let WriteEntry::Merge(_) = entry {
                let rows = guards.get(table).ok_or(StoreStatus::TableNotFound)?;
                if !rows.contains_key(key) {
                    return Err(StoreStatus::KeyNotFound);
                }
            }
        }

        let version = self.next_version();
        for ((table, key), entry) in writes.iter() {
            let rows = guards.get_mut(table).ok_or(StoreStatus::TableNotFound)?;
            match entry {
                WriteEntry::Put(value) => {
                    rows.insert(
                        key.clone(),
                        Versioned {
                            version,
                            value: value.clone(),
                        },
                    );
                }
                WriteEntry::Delete => {
                    rows.remove(key);
                }
                WriteEntry::Merge(delta) => {
                    let op = self.merge_operator()?;
                    let base = rows.get(key).ok_or(StoreStatus::KeyNotFound)?;
                    let merged = op.apply_delta(*table, key, &base.value, delta)?;
                    rows.insert(
                        key.clone(),
                        Versioned {
                            version,
                            value: merged,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumMerge;

    impl MergeOperator for SumMerge {
        fn merge_deltas(
            &self,
            _table: TableId,
            _key: &[u8],
            older: &[u8],
            newer: &[u8],
        ) -> StoreResult<Vec<u8>> {
            let sum = decode_u64(older)? + decode_u64(newer)?;
            Ok(sum.to_le_bytes().to_vec())
        }

        fn apply_delta(
            &self,
            _table: TableId,
            _key: &[u8],
            base: &[u8],
            delta: &[u8],
        ) -> StoreResult<Vec<u8>> {
            let sum = decode_u64(base)? + decode_u64(delta)?;
            Ok(sum.to_le_bytes().to_vec())
        }
    }

    fn decode_u64(bytes: &[u8]) -> StoreResult<u64> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| StoreStatus::InvalidRecord("expected u64".to_string()))?;
        Ok(u64::from_le_bytes(arr))
    }

    fn store_with_table() -> (MemoryStore, TableId) {
        let store = MemoryStore::new();
        let table = store.create_table("t").unwrap();
        (store, table)
    }

    #[test]
    fn test_read_your_own_write() {
        let (store, t) = store_with_table();
        let txn = store.begin_txn().unwrap();
        store.insert(&txn, t, b"a".to_vec(), b"1".to_vec()).unwrap();
        assert_eq!(store.get(&txn, t, b"a").unwrap(), b"1".to_vec());
        store.commit_txn(&txn).unwrap();
        assert_eq!(store.raw_get(t, b"a").unwrap(), b"1".to_vec());
    }

    #[test]
    fn test_update_requires_existing_key() {
        let (store, t) = store_with_table();
        let txn = store.begin_txn().unwrap();
        assert_eq!(
            store.update(&txn, t, b"missing", b"x".to_vec()),
            Err(StoreStatus::KeyNotFound)
        );
    }

    #[test]
    fn test_conflicting_read_fails_commit() {
        let (store, t) = store_with_table();
        store.raw_insert(t, b"k".to_vec(), b"0".to_vec()).unwrap();

        let t1 = store.begin_txn().unwrap();
        store.get(&t1, t, b"k").unwrap();

        let t2 = store.begin_txn().unwrap();
        store.update(&t2, t, b"k", b"1".to_vec()).unwrap();
        store.commit_txn(&t2).unwrap();

        store.insert(&t1, t, b"other".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(store.commit_txn(&t1), Err(StoreStatus::Conflict));
        // The conflicting transaction must not have applied its writes.
        assert_eq!(store.raw_get(t, b"other"), Err(StoreStatus::KeyNotFound));
    }

    #[test]
    fn test_observed_absence_is_validated() {
        let (store, t) = store_with_table();
        let t1 = store.begin_txn().unwrap();
        assert_eq!(store.get(&t1, t, b"k"), Err(StoreStatus::KeyNotFound));

        let t2 = store.begin_txn().unwrap();
        store.insert(&t2, t, b"k".to_vec(), b"v".to_vec()).unwrap();
        store.commit_txn(&t2).unwrap();

        store.insert(&t1, t, b"j".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(store.commit_txn(&t1), Err(StoreStatus::Conflict));
    }

    #[test]
    fn test_upserts_accumulate_without_reads() {
        let (store, t) = store_with_table();
        store.set_merge_operator(Arc::new(SumMerge));
        store
            .raw_insert(t, b"acc".to_vec(), 10u64.to_le_bytes().to_vec())
            .unwrap();

        let txn = store.begin_txn().unwrap();
        store
            .upsert(&txn, t, b"acc".to_vec(), 5u64.to_le_bytes().to_vec())
            .unwrap();
        store
            .upsert(&txn, t, b"acc".to_vec(), 7u64.to_le_bytes().to_vec())
            .unwrap();
        // Pure blind writes record no reads, so there is nothing to
        // conflict on even if another commit lands in between.
        let other = store.begin_txn().unwrap();
        store
            .upsert(&other, t, b"acc".to_vec(), 100u64.to_le_bytes().to_vec())
            .unwrap();
        store.commit_txn(&other).unwrap();

        store.commit_txn(&txn).unwrap();
        assert_eq!(
            store.raw_get(t, b"acc").unwrap(),
            122u64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_upsert_without_operator_is_unsupported() {
        let (store, t) = store_with_table();
        let txn = store.begin_txn().unwrap();
        assert_eq!(
            store.upsert(&txn, t, b"k".to_vec(), b"d".to_vec()),
            Err(StoreStatus::Unsupported)
        );
    }

    #[test]
    fn test_get_resolves_pending_merge() {
        let (store, t) = store_with_table();
        store.set_merge_operator(Arc::new(SumMerge));
        store
            .raw_insert(t, b"acc".to_vec(), 1u64.to_le_bytes().to_vec())
            .unwrap();
        let txn = store.begin_txn().unwrap();
        store
            .upsert(&txn, t, b"acc".to_vec(), 2u64.to_le_bytes().to_vec())
            .unwrap();
        assert_eq!(
            store.get(&txn, t, b"acc").unwrap(),
            3u64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_scan_is_ordered_and_bounded() {
        let (store, t) = store_with_table();
        for i in 0..10u8 {
            store.raw_insert(t, vec![i], vec![i]).unwrap();
        }
        let txn = store.begin_txn().unwrap();
        let rows = store.scan(&txn, t, ScanOptions::new(vec![3], 4)).unwrap();
        assert_eq!(
            rows.iter().map(|(k, _)| k[0]).collect::<Vec<u8>>(),
            vec![3, 4, 5, 6]
        );
        store.commit_txn(&txn).unwrap();
    }

    #[test]
    fn test_delete_roundtrip() {
        let (store, t) = store_with_table();
        store.raw_insert(t, b"k".to_vec(), b"v".to_vec()).unwrap();
        let txn = store.begin_txn().unwrap();
        store.delete(&txn, t, b"k").unwrap();
        assert_eq!(store.get(&txn, t, b"k"), Err(StoreStatus::KeyNotFound));
        store.commit_txn(&txn).unwrap();
        assert_eq!(store.raw_get(t, b"k"), Err(StoreStatus::KeyNotFound));
    }

    #[test]
    fn test_missing_table() {
        let store = MemoryStore::new();
        assert_eq!(store.raw_get(99, b"k"), Err(StoreStatus::TableNotFound));
    }
}

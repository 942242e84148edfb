use super::config::TpccConfig;
use super::loader::TpccTableInfo;
use super::neworder::run_new_order;
use super::params::{home_warehouse, next_txn_kind, NewOrderInput, PaymentInput, TxnKind};
use super::payment::run_payment;
use crate::log_debug;
use crate::store::{StoreResult, StoreStatus, TxnStore};
use rand::rngs::SmallRng;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct PerTxnType {
    pub attempts: u64,
    pub num_commits: u64,
    pub num_aborts: u64,
}

impl PerTxnType {
    pub fn add(&mut self, other: &PerTxnType) {
        self.attempts += other.attempts;
        self.num_commits += other.num_commits;
        self.num_aborts += other.num_aborts;
    }
}

/// Per-worker counters and latency series, merged after the run.
#[derive(Debug, Clone, Default)]
pub struct TpccStat {
    per_type: [PerTxnType; TxnKind::COUNT],
    pub commit_latencies_us: Vec<u64>,
    pub abort_latencies_us: Vec<u64>,
    pub retries_per_txn: Vec<u32>,
}

impl TpccStat {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, other: &TpccStat) {
        for (mine, theirs) in self.per_type.iter_mut().zip(other.per_type.iter()) {
            mine.add(theirs);
        }
        self.commit_latencies_us
            .extend_from_slice(&other.commit_latencies_us);
        self.abort_latencies_us
            .extend_from_slice(&other.abort_latencies_us);
        self.retries_per_txn.extend_from_slice(&other.retries_per_txn);
    }

    pub fn total_commits(&self) -> u64 {
        self.per_type.iter().map(|t| t.num_commits).sum()
    }

    pub fn total_aborts(&self) -> u64 {
        self.per_type.iter().map(|t| t.num_aborts).sum()
    }

    pub fn total_attempts(&self) -> u64 {
        self.per_type.iter().map(|t| t.attempts).sum()
    }
}

impl Index<TxnKind> for TpccStat {
    type Output = PerTxnType;

    fn index(&self, kind: TxnKind) -> &PerTxnType {
        &self.per_type[kind as usize]
    }
}

impl IndexMut<TxnKind> for TpccStat {
    fn index_mut(&mut self, kind: TxnKind) -> &mut PerTxnType {
        &mut self.per_type[kind as usize]
    }
}

impl fmt::Display for TpccStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in [TxnKind::Payment, TxnKind::NewOrder, TxnKind::OrderStatus] {
            let t = &self[kind];
            if t.attempts == 0 {
                continue;
            }
            writeln!(
                f,
                "{:>12}: {} commits, {} aborts, {} attempts ({:.2}% abort)",
                kind.name(),
                t.num_commits,
                t.num_aborts,
                t.attempts,
                100.0 * t.num_aborts as f64 / t.attempts as f64,
            )?;
        }
        Ok(())
    }
}

enum TxnInput {
    Payment(PaymentInput),
    NewOrder(NewOrderInput),
}

/// Draws one transaction from the mix, runs it with conflict retries, and
/// books the outcome into `stat`. The generated input is replayed
/// unchanged across retries.
pub fn run_tpcc_transaction<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    tables: &TpccTableInfo,
    rng: &mut SmallRng,
    thread_id: usize,
    stat: &mut TpccStat,
) -> StoreResult<bool> {
    let w_id = home_warehouse(config, thread_id);
    let kind = next_txn_kind(config, rng);
    let input = match kind {
        TxnKind::Payment => TxnInput::Payment(PaymentInput::generate(config, rng, w_id)),
        TxnKind::NewOrder | TxnKind::OrderStatus => {
            TxnInput::NewOrder(NewOrderInput::generate(config, rng, w_id))
        }
    };

    let start = Instant::now();
    let mut retry: u32 = 0;
    let committed = loop {
        stat[kind].attempts += 1;
        let result = match &input {
            TxnInput::Payment(p) => run_payment(config, store, tables, p),
            TxnInput::NewOrder(n) => run_new_order(config, store, tables, n).map(|_| ()),
        };
        match result {
            Ok(()) => break true,
            Err(StoreStatus::Conflict) => {
                stat[kind].num_aborts += 1;
                log_debug!("{} conflicted, retry {}", kind.name(), retry);
                let penalty = config
                    .min_abort_penalty_us
                    .saturating_mul(1u64 << retry.min(63));
                if penalty > 0 {
                    std::thread::sleep(Duration::from_micros(penalty));
                }
                retry += 1;
                if retry > config.max_txn_retry {
                    break false;
                }
            }
            Err(status) => return Err(status),
        }
    };

    let latency = start.elapsed().as_micros() as u64;
    if committed {
        stat[kind].num_commits += 1;
        stat.commit_latencies_us.push(latency);
    } else {
        stat.abort_latencies_us.push(latency);
    }
    stat.retries_per_txn.push(retry);
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::super::loader::tpcc_load_all_tables;
    use super::*;
    use crate::random::rng_for_thread;
    use crate::store::MemoryStore;
    use crate::tpcc::TpccMergeOperator;
    use clap::Parser;
    use std::sync::Arc;

    #[test]
    fn test_transactions_commit_without_contention() {
        let config = TpccConfig::parse_from([
            "tpcc",
            "--max-items",
            "30",
            "--cust-per-dist",
            "15",
            "--min-abort-penalty-us",
            "0",
        ]);
        let store = MemoryStore::new();
        let info = tpcc_load_all_tables(&config, &store).unwrap();
        store.set_merge_operator(Arc::new(TpccMergeOperator::new(
            config.cust_per_dist,
            &info,
        )));

        let mut rng = rng_for_thread(0);
        let mut stat = TpccStat::new();
        for _ in 0..50 {
            assert!(run_tpcc_transaction(&config, &store, &info, &mut rng, 0, &mut stat).unwrap());
        }
        assert_eq!(stat.total_commits(), 50);
        assert_eq!(stat.total_aborts(), 0);
        assert_eq!(stat.total_attempts(), 50);
        assert_eq!(stat.commit_latencies_us.len(), 50);
        // Both transaction types appear in a 50/50 mix over 50 draws.
        assert!(stat[TxnKind::Payment].num_commits > 0);
        assert!(stat[TxnKind::NewOrder].num_commits > 0);
    }
}

use crate::client::{ClientEngine, ClientStats, ProportionalGroupBuilder, SingleOpBuilder, TransactionBuilder};
use crate::log_info;
use crate::random::rng_for_thread;
use crate::store::{StoreStatus, TableId, TxnStore};
use crate::tpcc::{run_tpcc_transaction, TpccConfig, TpccStat, TpccTableInfo};
use crate::workload::{ConfigError, CoreWorkload, WorkloadState, YcsbConfig};
use hdrhistogram::Histogram;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub mod prelude {
    pub use super::{run_tpcc, run_ycsb, run_ycsb_load, BenchError, RunReport, TpccReport};
}

#[derive(Debug)]
pub enum BenchError {
    Config(ConfigError),
    Store(StoreStatus),
}

impl std::fmt::Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchError::Config(e) => write!(f, "configuration error: {}", e),
            BenchError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for BenchError {}

impl From<ConfigError> for BenchError {
    fn from(e: ConfigError) -> Self {
        BenchError::Config(e)
    }
}

impl From<StoreStatus> for BenchError {
    fn from(e: StoreStatus) -> Self {
        BenchError::Store(e)
    }
}

fn worker_panicked() -> BenchError {
    BenchError::Store(StoreStatus::Error("worker thread panicked".to_string()))
}

/// The [start, end) share of `total` work items owned by thread `index`.
fn per_thread_share(total: u64, num_threads: usize, index: usize) -> u64 {
    let t = num_threads as u64;
    let i = index as u64;
    total * (i + 1) / t - total * i / t
}

fn histogram() -> Histogram<u64> {
    // Three significant digits is always a valid configuration.
    Histogram::new(3).unwrap()
}

fn fill_histogram(values: &[u64]) -> Histogram<u64> {
    let mut hist = histogram();
    for v in values {
        hist.saturating_record(*v);
    }
    hist
}

fn print_histogram(name: &str, hist: &Histogram<u64>) {
    if hist.is_empty() {
        return;
    }
    println!("# {} latency (us)", name);
    println!("  Min:   {}", hist.min());
    println!("  Max:   {}", hist.max());
    println!("  Avg:   {:.1}", hist.mean());
    println!("  P50:   {}", hist.value_at_quantile(0.50));
    println!("  P90:   {}", hist.value_at_quantile(0.90));
    println!("  P95:   {}", hist.value_at_quantile(0.95));
    println!("  P99:   {}", hist.value_at_quantile(0.99));
    println!("  P99.9: {}", hist.value_at_quantile(0.999));
}

/// Merged outcome of one phase across all workers.
pub struct RunReport {
    pub duration: Duration,
    pub committed: u64,
    pub aborted: u64,
    pub attempted: u64,
    pub commit_hist: Histogram<u64>,
    pub abort_hist: Histogram<u64>,
    pub retry_hist: Histogram<u64>,
}

impl RunReport {
    fn from_client_stats(stats: &ClientStats, duration: Duration) -> Self {
        RunReport {
            duration,
            committed: stats.committed,
            aborted: stats.aborted,
            attempted: stats.attempted,
            commit_hist: fill_histogram(&stats.commit_latencies_us),
            abort_hist: fill_histogram(&stats.abort_latencies_us),
            retry_hist: fill_histogram(
                &stats
                    .retries_per_txn
                    .iter()
                    .map(|r| *r as u64)
                    .collect::<Vec<u64>>(),
            ),
        }
    }

    pub fn throughput_ktps(&self) -> f64 {
        if self.duration.as_secs_f64() == 0.0 {
            return 0.0;
        }
        self.committed as f64 / self.duration.as_secs_f64() / 1000.0
    }

    pub fn print(&self, label: &str) {
        println!("== {} ==", label);
        println!("Duration:   {:.3} s", self.duration.as_secs_f64());
        println!("Committed:  {}", self.committed);
        println!("Aborted:    {}", self.aborted);
        println!("Throughput: {:.3} KTPS", self.throughput_ktps());
        if self.attempted > 0 {
            println!(
                "Failures:   {:.2}% of {} transactions",
                100.0 * (self.attempted - self.committed) as f64 / self.attempted as f64,
                self.attempted
            );
        }
        print_histogram("commit", &self.commit_hist);
        print_histogram("abort", &self.abort_hist);
        if !self.retry_hist.is_empty() && self.retry_hist.max() > 0 {
            println!("# retries per transaction");
            println!("  Max:   {}", self.retry_hist.max());
            println!("  P99:   {}", self.retry_hist.value_at_quantile(0.99));
        }
    }
}

/// Preloads the keyspace, splitting the record count across workers.
pub fn run_ycsb_load<S: TxnStore>(
    config: &YcsbConfig,
    store: &S,
    state: &WorkloadState,
    table: TableId,
) -> Result<RunReport, BenchError> {
    let start = Instant::now();
    let total = std::thread::scope(|scope| -> Result<ClientStats, BenchError> {
        let mut handles = Vec::with_capacity(config.num_threads);
        for i in 0..config.num_threads {
            handles.push(scope.spawn(move || -> Result<ClientStats, BenchError> {
                let mut rng = rng_for_thread(i as u64);
                let mut workload = CoreWorkload::new(config, state, table)?;
                let mut engine = ClientEngine::new(
                    store,
                    Box::new(SingleOpBuilder),
                    config.min_abort_penalty_us,
                    config.max_txn_retry,
                );
                let num_ops = per_thread_share(config.record_count, config.num_threads, i);
                for _ in 0..num_ops {
                    engine.do_insert(&mut workload, &mut rng)?;
                }
                engine.stats.committed = num_ops;
                Ok(engine.stats)
            }));
        }
        let mut total = ClientStats::new();
        for handle in handles {
            total.merge(&handle.join().map_err(|_| worker_panicked())??);
        }
        Ok(total)
    })?;
    let duration = start.elapsed();
    log_info!("loaded {} records in {:?}", total.committed, duration);
    Ok(RunReport::from_client_stats(&total, duration))
}

/// Runs the transaction phase. Count-driven by default; when a duration is
/// configured, every worker keeps going until all of them have passed the
/// deadline, so the slowest worker never runs against an idle system.
pub fn run_ycsb<S: TxnStore>(
    config: &YcsbConfig,
    store: &S,
    state: &WorkloadState,
    table: TableId,
) -> Result<RunReport, BenchError> {
    let num_done = AtomicU64::new(0);
    // Claimed-transaction counter shared by every worker: in count-driven
    // mode it doubles as the work queue, so fast workers pick up the slack
    // of slow ones.
    let progress = AtomicU64::new(0);
    let start = Instant::now();
    let total = std::thread::scope(|scope| -> Result<ClientStats, BenchError> {
        let mut handles = Vec::with_capacity(config.num_threads);
        for i in 0..config.num_threads {
            let num_done = &num_done;
            let progress = &progress;
            handles.push(scope.spawn(move || -> Result<ClientStats, BenchError> {
                let mut rng = rng_for_thread(i as u64);
                let mut workload = CoreWorkload::new(config, state, table)?;
                let builder: Box<dyn TransactionBuilder> = if config.ops_per_transaction > 1 {
                    Box::new(ProportionalGroupBuilder::new(config.ops_per_transaction))
                } else {
                    Box::new(SingleOpBuilder)
                };
                let mut engine = ClientEngine::new(
                    store,
                    builder,
                    config.min_abort_penalty_us,
                    config.max_txn_retry,
                );

                if config.duration_secs > 0 {
                    let deadline = Duration::from_secs(config.duration_secs);
                    let started = Instant::now();
                    let mut signaled = false;
                    while num_done.load(Ordering::Acquire) < config.num_threads as u64 {
                        engine.do_transaction(&mut workload, &mut rng)?;
                        progress.fetch_add(1, Ordering::Relaxed);
                        if !signaled && started.elapsed() >= deadline {
                            num_done.fetch_add(1, Ordering::AcqRel);
                            signaled = true;
                        }
                    }
                } else if config.max_txn_count > 0 {
                    for _ in 0..config.max_txn_count {
                        engine.do_transaction(&mut workload, &mut rng)?;
                        progress.fetch_add(1, Ordering::Relaxed);
                    }
                } else {
                    let total_txns =
                        config.operation_count / config.ops_per_transaction.max(1) as u64;
                    while progress.fetch_add(1, Ordering::AcqRel) < total_txns {
                        engine.do_transaction(&mut workload, &mut rng)?;
                    }
                }
                Ok(engine.stats)
            }));
        }
        let mut total = ClientStats::new();
        for handle in handles {
            total.merge(&handle.join().map_err(|_| worker_panicked())??);
        }
        Ok(total)
    })?;
    Ok(RunReport::from_client_stats(&total, start.elapsed()))
}

/// Run outcome plus the per-transaction-type breakdown.
pub struct TpccReport {
    pub report: RunReport,
    pub stat: TpccStat,
}

impl TpccReport {
    pub fn print(&self) {
        self.report.print("TPC-C");
        print!("{}", self.stat);
    }
}

pub fn run_tpcc<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    tables: &TpccTableInfo,
) -> Result<TpccReport, BenchError> {
    let num_done = AtomicU64::new(0);
    let start = Instant::now();
    let total = std::thread::scope(|scope| -> Result<TpccStat, BenchError> {
        let mut handles = Vec::with_capacity(config.num_threads);
        for i in 0..config.num_threads {
            let num_done = &num_done;
            handles.push(scope.spawn(move || -> Result<TpccStat, BenchError> {
                let mut rng = rng_for_thread(i as u64);
                let mut stat = TpccStat::new();
                if config.duration_secs > 0 {
                    let deadline = Duration::from_secs(config.duration_secs);
                    let started = Instant::now();
                    let mut signaled = false;
                    while num_done.load(Ordering::Acquire) < config.num_threads as u64 {
                        run_tpcc_transaction(config, store, tables, &mut rng, i, &mut stat)?;
                        if !signaled && started.elapsed() >= deadline {
                            num_done.fetch_add(1, Ordering::AcqRel);
                            signaled = true;
                        }
                    }
                } else {
                    for _ in 0..config.num_transactions {
                        run_tpcc_transaction(config, store, tables, &mut rng, i, &mut stat)?;
                    }
                }
                Ok(stat)
            }));
        }
        let mut total = TpccStat::new();
        for handle in handles {
            total.add(&handle.join().map_err(|_| worker_panicked())??);
        }
        Ok(total)
    })?;
    let duration = start.elapsed();
    let stats = ClientStats {
        committed: total.total_commits(),
        aborted: total.total_aborts(),
        attempted: total.retries_per_txn.len() as u64,
        commit_latencies_us: total.commit_latencies_us.clone(),
        abort_latencies_us: total.abort_latencies_us.clone(),
        retries_per_txn: total.retries_per_txn.clone(),
    };
    Ok(TpccReport {
        report: RunReport::from_client_stats(&stats, duration),
        stat: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1000, 3)]
    #[case(7, 4)]
    #[case(100, 1)]
    #[case(5, 8)]
    fn test_per_thread_share_partitions_exactly(#[case] total: u64, #[case] threads: usize) {
        let sum: u64 = (0..threads)
            .map(|i| per_thread_share(total, threads, i))
            .sum();
        assert_eq!(sum, total);
    }

    #[test]
    fn test_report_counts_failures() {
        let stats = ClientStats {
            committed: 90,
            aborted: 25,
            attempted: 100,
            commit_latencies_us: vec![100; 90],
            abort_latencies_us: vec![5000; 10],
            retries_per_txn: vec![0; 100],
        };
        let report = RunReport::from_client_stats(&stats, Duration::from_secs(1));
        assert_eq!(report.committed, 90);
        assert_eq!(report.commit_hist.len(), 90);
        assert_eq!(report.abort_hist.len(), 10);
        assert!((report.throughput_ktps() - 0.09).abs() < 1e-9);
    }
}

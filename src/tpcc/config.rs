use clap::Parser;

pub const DIST_PER_WARE: u64 = 10;
pub const MIN_OL_PER_ORDER: u64 = 5;
pub const MAX_OL_PER_ORDER: u64 = 15;

/// Scale and run parameters. The defaults follow the classic mix: one
/// warehouse, ten districts, 3000 customers per district, 100k items.
#[derive(Debug, Parser, Clone)]
#[command(version, about = "Order-entry workload driver", long_about = None)]
pub struct TpccConfig {
    /// Number of warehouses
    #[arg(short = 'w', long, default_value_t = 1)]
    pub num_warehouses: u64,

    /// Number of worker threads
    #[arg(short = 't', long, default_value_t = 1)]
    pub num_threads: usize,

    /// Transactions per thread; ignored when a duration is given
    #[arg(short = 'n', long, default_value_t = 10000)]
    pub num_transactions: u64,

    /// Wall-clock run duration in seconds; zero means count driven
    #[arg(short = 'D', long, default_value_t = 0)]
    pub duration_secs: u64,

    /// Fraction of payment transactions; the rest are new orders
    #[arg(short = 'p', long, default_value_t = 0.5)]
    pub perc_payment: f64,

    /// Write aggregate rows as blind deltas resolved by the merge
    /// operator instead of read-modify-write
    #[arg(short = 'u', long, default_value_t = false)]
    pub use_upserts: bool,

    /// Items in the item table
    #[arg(long, default_value_t = 100000)]
    pub max_items: u64,

    /// Customers per district
    #[arg(long, default_value_t = 3000)]
    pub cust_per_dist: u64,

    /// Abort backoff unit in microseconds; doubles per retry
    #[arg(long, default_value_t = 1000)]
    pub min_abort_penalty_us: u64,

    /// Maximum conflict retries per transaction
    #[arg(long, default_value_t = 10)]
    pub max_txn_retry: u32,
}

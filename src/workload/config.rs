use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(version, about = "Key-value workload driver", long_about = None)]
pub struct YcsbConfig {
    /// Number of worker threads
    #[arg(short = 't', long, default_value_t = 1)]
    pub num_threads: usize,

    /// Number of records loaded before the run phase
    #[arg(short = 'r', long, default_value_t = 1000)]
    pub record_count: u64,

    /// Total number of operations issued during the run phase
    #[arg(short = 'o', long, default_value_t = 10000)]
    pub operation_count: u64,

    /// Per-thread transaction cap; zero means operation-count driven
    #[arg(long, default_value_t = 0)]
    pub max_txn_count: u64,

    /// Wall-clock run duration in seconds; zero means count driven
    #[arg(short = 'D', long, default_value_t = 0)]
    pub duration_secs: u64,

    /// Fields per record
    #[arg(long, default_value_t = 1)]
    pub field_count: u64,

    /// Field length (exact for constant, upper bound otherwise)
    #[arg(long, default_value_t = 100)]
    pub field_length: u64,

    /// Field length distribution: constant, uniform or zipfian
    #[arg(long, default_value = "constant")]
    pub field_len_dist: String,

    /// Proportion of read operations
    #[arg(long, default_value_t = 0.9)]
    pub read_proportion: f64,

    /// Proportion of update operations
    #[arg(long, default_value_t = 0.1)]
    pub update_proportion: f64,

    /// Proportion of insert operations
    #[arg(long, default_value_t = 0.0)]
    pub insert_proportion: f64,

    /// Proportion of scan operations
    #[arg(long, default_value_t = 0.0)]
    pub scan_proportion: f64,

    /// Proportion of read-modify-write operations
    #[arg(long, default_value_t = 0.0)]
    pub read_modify_write_proportion: f64,

    /// Request distribution: uniform, zipfian or latest
    #[arg(long, default_value = "zipfian")]
    pub request_distribution: String,

    /// Scan length distribution: uniform or zipfian
    #[arg(long, default_value = "uniform")]
    pub scan_len_dist: String,

    /// Maximum scan length
    #[arg(long, default_value_t = 1000)]
    pub max_scan_length: u64,

    /// Zero padding width of formatted key numbers
    #[arg(long, default_value_t = 20)]
    pub zero_padding: usize,

    /// Insert order: hashed or ordered
    #[arg(long, default_value = "hashed")]
    pub insert_order: String,

    /// Zipfian skew
    #[arg(long, default_value_t = 0.99)]
    pub theta: f64,

    /// Read every field of a record, or a single random field
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub read_all_fields: bool,

    /// Write every field on update, or a single random field
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub write_all_fields: bool,

    /// Operations grouped into one transaction
    #[arg(long, default_value_t = 1)]
    pub ops_per_transaction: usize,

    /// Abort backoff unit in microseconds; doubles per retry
    #[arg(long, default_value_t = 1000)]
    pub min_abort_penalty_us: u64,

    /// Maximum conflict retries per transaction
    #[arg(long, default_value_t = 10)]
    pub max_txn_retry: u32,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    UnknownRequestDistribution(String),
    UnknownFieldLengthDistribution(String),
    UnknownScanLengthDistribution(String),
    UnknownInsertOrder(String),
    NoPositiveProportions,
    InvalidTheta(f64),
    NoRecords,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownRequestDistribution(d) => {
                write!(f, "unknown request distribution: {}", d)
            }
            ConfigError::UnknownFieldLengthDistribution(d) => {
                write!(f, "unknown field length distribution: {}", d)
            }
            ConfigError::UnknownScanLengthDistribution(d) => {
                write!(f, "unknown scan length distribution: {}", d)
            }
            ConfigError::UnknownInsertOrder(o) => write!(f, "unknown insert order: {}", o),
            ConfigError::NoPositiveProportions => {
                write!(f, "at least one operation proportion must be positive")
            }
            ConfigError::InvalidTheta(t) => write!(f, "theta must be in [0, 1): {}", t),
            ConfigError::NoRecords => write!(f, "record count must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

use super::config::{ConfigError, YcsbConfig};
use crate::client::{OpKind, Operation};
use crate::generator::{
    BatchedCounterGenerator, ConstGenerator, DiscreteGenerator, Generator,
    ScrambledZipfianGenerator, SharedCounter, SkewedLatestGenerator, UniformGenerator,
    ZipfianGenerator,
};
use crate::random::{fnv1a_64, rand_astring};
use crate::store::TableId;
use rand::rngs::SmallRng;
use std::sync::Arc;

pub const TABLE_NAME: &str = "usertable";
pub const KEY_PREFIX: &str = "user";

// Skew for the auxiliary zipfian choosers (field lengths, scan lengths).
// The request distribution uses the configured theta instead.
const AUX_ZIPFIAN_THETA: f64 = 0.99;

/// State shared by every worker of one benchmark instance: the load-phase
/// key cursor and the insertion counter that bounds run-phase key choosers.
pub struct WorkloadState {
    key_sequence: BatchedCounterGenerator,
    insert_sequence: Arc<SharedCounter>,
}

impl WorkloadState {
    pub fn new(config: &YcsbConfig) -> Self {
        let batch_size = Self::batch_size(config.record_count, config.num_threads);
        WorkloadState {
            key_sequence: BatchedCounterGenerator::new(0, batch_size),
            insert_sequence: Arc::new(SharedCounter::new(config.record_count)),
        }
    }

    /// Load keys are claimed in batches of roughly sqrt(record count),
    /// shrunk so every thread gets at least one batch.
    fn batch_size(record_count: u64, num_threads: usize) -> u64 {
        let mut batch = (record_count as f64).sqrt() as u64;
        if batch > 0 && record_count / batch < num_threads as u64 {
            batch = record_count / num_threads as u64;
        }
        batch.max(1)
    }

    pub fn insert_sequence(&self) -> Arc<SharedCounter> {
        self.insert_sequence.clone()
    }
}

/// Per-worker generator bundle turning the configuration into a stream of
/// operation descriptors.
pub struct CoreWorkload {
    table: TableId,
    field_count: u64,
    read_all_fields: bool,
    write_all_fields: bool,
    ordered_inserts: bool,
    zero_padding: usize,
    ops_per_transaction: usize,
    key_sequence: BatchedCounterGenerator,
    insert_sequence: Arc<SharedCounter>,
    key_chooser: Box<dyn Generator>,
    field_chooser: UniformGenerator,
    field_len_gen: Box<dyn Generator>,
    scan_len_chooser: Box<dyn Generator>,
    op_chooser: DiscreteGenerator<OpKind>,
}

impl CoreWorkload {
    pub fn new(
        config: &YcsbConfig,
        state: &WorkloadState,
        table: TableId,
    ) -> Result<Self, ConfigError> {
        if config.record_count == 0 {
            return Err(ConfigError::NoRecords);
        }
        if !(0.0..1.0).contains(&config.theta) {
            return Err(ConfigError::InvalidTheta(config.theta));
        }

        let ordered_inserts = match config.insert_order.as_str() {
            "ordered" => true,
            "hashed" => false,
            other => return Err(ConfigError::UnknownInsertOrder(other.to_string())),
        };

        let field_len_gen: Box<dyn Generator> = match config.field_len_dist.as_str() {
            "constant" => Box::new(ConstGenerator::new(config.field_length)),
            "uniform" => Box::new(UniformGenerator::new(1, config.field_length)),
            "zipfian" => Box::new(ZipfianGenerator::new(
                1,
                config.field_length,
                AUX_ZIPFIAN_THETA,
            )),
            other => {
                return Err(ConfigError::UnknownFieldLengthDistribution(
                    other.to_string(),
                ))
            }
        };

        let mut op_chooser = DiscreteGenerator::new();
        for (kind, proportion) in [
            (OpKind::Read, config.read_proportion),
            (OpKind::Update, config.update_proportion),
            (OpKind::Insert, config.insert_proportion),
            (OpKind::Scan, config.scan_proportion),
            (OpKind::ReadModifyWrite, config.read_modify_write_proportion),
        ] {
            if proportion > 0.0 {
                op_chooser.add_value(kind, proportion);
            }
        }
        if op_chooser.is_empty() {
            return Err(ConfigError::NoPositiveProportions);
        }

        let key_chooser: Box<dyn Generator> = match config.request_distribution.as_str() {
            "uniform" => Box::new(UniformGenerator::new(0, config.record_count - 1)),
            "zipfian" => {
                // Size the chooser past the preloaded keyspace so run-phase
                // inserts cannot outrun it.
                let op_count = if config.max_txn_count > 0 {
                    config.max_txn_count * config.num_threads as u64
                } else {
                    config.operation_count
                };
                let headroom = (op_count as f64 * config.insert_proportion * 2.0) as u64;
                let num_items = config.record_count + headroom;
                Box::new(ScrambledZipfianGenerator::new(
                    0,
                    num_items - 1,
                    config.theta,
                ))
            }
            "latest" => Box::new(SkewedLatestGenerator::new(
                state.insert_sequence(),
                config.theta,
            )),
            other => return Err(ConfigError::UnknownRequestDistribution(other.to_string())),
        };

        let scan_len_chooser: Box<dyn Generator> = match config.scan_len_dist.as_str() {
            "uniform" => Box::new(UniformGenerator::new(1, config.max_scan_length)),
            "zipfian" => Box::new(ZipfianGenerator::new(
                1,
                config.max_scan_length,
                AUX_ZIPFIAN_THETA,
            )),
            other => return Err(ConfigError::UnknownScanLengthDistribution(other.to_string())),
        };

        Ok(CoreWorkload {
            table,
            field_count: config.field_count,
            read_all_fields: config.read_all_fields,
            write_all_fields: config.write_all_fields,
            ordered_inserts,
            zero_padding: config.zero_padding,
            ops_per_transaction: config.ops_per_transaction.max(1),
            key_sequence: state.key_sequence.partition(),
            insert_sequence: state.insert_sequence(),
            key_chooser,
            field_chooser: UniformGenerator::new(0, config.field_count.saturating_sub(1)),
            field_len_gen,
            scan_len_chooser,
            op_chooser,
        })
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    pub fn ops_per_transaction(&self) -> usize {
        self.ops_per_transaction
    }

    fn build_key_name(&self, keynum: u64) -> String {
        let keynum = if self.ordered_inserts {
            keynum
        } else {
            fnv1a_64(keynum)
        };
        format!(
            "{}{:0width$}",
            KEY_PREFIX,
            keynum,
            width = self.zero_padding
        )
    }

    /// Next key in the load sequence.
    pub fn next_sequence_key(&mut self, rng: &mut SmallRng) -> String {
        let keynum = self.key_sequence.next(rng);
        self.build_key_name(keynum)
    }

    /// Key for a run-phase read/update/scan target. Draws again whenever
    /// the chooser lands past the highest acknowledged insert.
    pub fn next_transaction_key(&mut self, rng: &mut SmallRng) -> String {
        let keynum = loop {
            let candidate = self.key_chooser.next(rng);
            if candidate <= self.insert_sequence.last() {
                break candidate;
            }
        };
        self.build_key_name(keynum)
    }

    /// Key for a run-phase insert; claims the next slot in the shared
    /// insertion sequence.
    pub fn next_insert_key(&mut self) -> String {
        let keynum = self.insert_sequence.next();
        self.build_key_name(keynum)
    }

    pub fn next_field_name(&mut self, rng: &mut SmallRng) -> String {
        format!("field{}", self.field_chooser.next(rng))
    }

    pub fn next_scan_length(&mut self, rng: &mut SmallRng) -> u64 {
        self.scan_len_chooser.next(rng)
    }

    /// A full record: every field populated with a random value.
    pub fn build_values(&mut self, rng: &mut SmallRng) -> Vec<(String, String)> {
        (0..self.field_count)
            .map(|i| {
                let len = self.field_len_gen.next(rng) as usize;
                (format!("field{}", i), rand_astring(rng, len, len))
            })
            .collect()
    }

    /// A single-field update for a randomly chosen field.
    pub fn build_update(&mut self, rng: &mut SmallRng) -> Vec<(String, String)> {
        let field = self.next_field_name(rng);
        let len = self.field_len_gen.next(rng) as usize;
        vec![(field, rand_astring(rng, len, len))]
    }

    /// Draws an operation kind and materializes the full descriptor.
    pub fn next_operation(&mut self, rng: &mut SmallRng) -> Operation {
        let kind = self.op_chooser.next(rng);
        match kind {
            OpKind::Read => Operation {
                kind,
                table: self.table,
                key: self.next_transaction_key(rng),
                scan_length: 0,
                read_fields: self.read_fields(rng),
                values: Vec::new(),
            },
            OpKind::Update => Operation {
                kind,
                table: self.table,
                key: self.next_transaction_key(rng),
                scan_length: 0,
                read_fields: Vec::new(),
                values: self.write_values(rng),
            },
            OpKind::Insert => Operation {
                kind,
                table: self.table,
                key: self.next_insert_key(),
                scan_length: 0,
                read_fields: Vec::new(),
                values: self.build_values(rng),
            },
            OpKind::Scan => Operation {
                kind,
                table: self.table,
                key: self.next_transaction_key(rng),
                scan_length: self.next_scan_length(rng),
                read_fields: self.read_fields(rng),
                values: Vec::new(),
            },
            OpKind::ReadModifyWrite => Operation {
                kind,
                table: self.table,
                key: self.next_transaction_key(rng),
                scan_length: 0,
                read_fields: self.read_fields(rng),
                values: self.write_values(rng),
            },
        }
    }

    fn read_fields(&mut self, rng: &mut SmallRng) -> Vec<String> {
        if self.read_all_fields {
            Vec::new()
        } else {
            vec![self.next_field_name(rng)]
        }
    }

    fn write_values(&mut self, rng: &mut SmallRng) -> Vec<(String, String)> {
        if self.write_all_fields {
            self.build_values(rng)
        } else {
            self.build_update(rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_for_thread;
    use clap::Parser;

    fn config(args: &[&str]) -> YcsbConfig {
        let mut argv = vec!["ycsb"];
        argv.extend_from_slice(args);
        YcsbConfig::parse_from(argv)
    }

    fn workload(args: &[&str]) -> (CoreWorkload, WorkloadState, YcsbConfig) {
        let cfg = config(args);
        let state = WorkloadState::new(&cfg);
        let wl = CoreWorkload::new(&cfg, &state, 0).unwrap();
        (wl, state, cfg)
    }

    #[test]
    fn test_ordered_keys_preserve_sequence() {
        let (mut wl, _, _) = workload(&["--insert-order", "ordered", "--zero-padding", "8"]);
        let mut rng = rng_for_thread(0);
        assert_eq!(wl.next_sequence_key(&mut rng), "user00000000");
        assert_eq!(wl.next_sequence_key(&mut rng), "user00000001");
    }

    #[test]
    fn test_hashed_keys_scatter_sequence() {
        let (mut wl, _, _) = workload(&[]);
        let mut rng = rng_for_thread(0);
        let a = wl.next_sequence_key(&mut rng);
        let b = wl.next_sequence_key(&mut rng);
        assert_ne!(a, b);
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 20);
    }

    #[test]
    fn test_transaction_keys_stay_within_acknowledged_range() {
        let (mut wl, _, _) = workload(&[
            "--record-count",
            "100",
            "--insert-order",
            "ordered",
            "--request-distribution",
            "zipfian",
            "--insert-proportion",
            "0.5",
            "--read-proportion",
            "0.5",
            "--update-proportion",
            "0",
        ]);
        let mut rng = rng_for_thread(1);
        for _ in 0..1000 {
            let key = wl.next_transaction_key(&mut rng);
            let keynum: u64 = key[KEY_PREFIX.len()..].parse().unwrap();
            assert!(keynum < 100);
        }
    }

    #[test]
    fn test_read_only_mix_generates_only_reads() {
        let (mut wl, _, _) = workload(&[
            "--read-proportion",
            "1.0",
            "--update-proportion",
            "0",
        ]);
        let mut rng = rng_for_thread(2);
        for _ in 0..1000 {
            assert_eq!(wl.next_operation(&mut rng).kind, OpKind::Read);
        }
    }

    #[test]
    fn test_build_values_covers_every_field() {
        let (mut wl, _, _) = workload(&["--field-count", "4", "--field-length", "16"]);
        let mut rng = rng_for_thread(3);
        let values = wl.build_values(&mut rng);
        assert_eq!(values.len(), 4);
        for (i, (name, value)) in values.iter().enumerate() {
            assert_eq!(name, &format!("field{}", i));
            assert_eq!(value.len(), 16);
        }
    }

    #[test]
    fn test_insert_keys_extend_keyspace() {
        let (mut wl, state, _) = workload(&["--record-count", "10", "--insert-order", "ordered"]);
        assert_eq!(state.insert_sequence().last(), 9);
        let key = wl.next_insert_key();
        assert_eq!(key, format!("user{:020}", 10));
        assert_eq!(state.insert_sequence().last(), 10);
    }

    #[test]
    fn test_rejects_unknown_distribution() {
        let cfg = config(&["--request-distribution", "pareto"]);
        let state = WorkloadState::new(&cfg);
        assert_eq!(
            CoreWorkload::new(&cfg, &state, 0).err(),
            Some(ConfigError::UnknownRequestDistribution("pareto".to_string()))
        );
    }

    #[test]
    fn test_rejects_all_zero_proportions() {
        let cfg = config(&["--read-proportion", "0", "--update-proportion", "0"]);
        let state = WorkloadState::new(&cfg);
        assert_eq!(
            CoreWorkload::new(&cfg, &state, 0).err(),
            Some(ConfigError::NoPositiveProportions)
        );
    }
}

use clap::Parser;
use kvstress::harness::{run_tpcc, BenchError};
use kvstress::store::{MemoryStore, TxnStore};
use kvstress::tpcc::{tpcc_load_all_tables, tpcc_show_table_stats, TpccConfig, TpccMergeOperator};
use std::sync::Arc;
use std::time::Instant;

fn run(config: &TpccConfig) -> Result<(), BenchError> {
    let store = MemoryStore::new();

    let start = Instant::now();
    let info = tpcc_load_all_tables(config, &store)?;
    println!(
        "Loaded {} warehouse(s) in {:.3} s",
        config.num_warehouses,
        start.elapsed().as_secs_f64()
    );
    tpcc_show_table_stats(&store, &info);

    store.set_merge_operator(Arc::new(TpccMergeOperator::new(config.cust_per_dist, &info)));

    let report = run_tpcc(config, &store, &info)?;
    report.print();
    tpcc_show_table_stats(&store, &info);
    Ok(())
}

fn main() {
    let config = TpccConfig::parse();
    println!(
        "[{}] {:?}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        config
    );
    if let Err(e) = run(&config) {
        eprintln!("benchmark failed: {}", e);
        std::process::exit(1);
    }
}

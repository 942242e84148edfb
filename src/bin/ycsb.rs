use clap::Parser;
use kvstress::harness::{run_ycsb, run_ycsb_load, BenchError};
use kvstress::store::{MemoryStore, TxnStore};
use kvstress::workload::{WorkloadState, YcsbConfig, TABLE_NAME};

fn run(config: &YcsbConfig) -> Result<(), BenchError> {
    let store = MemoryStore::new();
    let table = store.create_table(TABLE_NAME)?;
    let state = WorkloadState::new(config);

    let load = run_ycsb_load(config, &store, &state, table)?;
    load.print("YCSB load");

    let run = run_ycsb(config, &store, &state, table)?;
    run.print("YCSB run");
    Ok(())
}

fn main() {
    let config = YcsbConfig::parse();
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

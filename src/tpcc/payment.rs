use super::config::TpccConfig;
use super::keys::{TpccKey, TpccTable};
use super::loader::TpccTableInfo;
use super::merge::{payment_note, prepend_note, CustomerDelta, PaymentFragment, TpccDelta};
use super::params::PaymentInput;
use super::rows::{HistoryRow, TpccRow};
use crate::log_trace;
use crate::store::{StoreResult, TxnStore};

/// Runs one payment transaction to completion. Conflicts surface as
/// `StoreStatus::Conflict` for the caller's retry loop.
///
/// In upsert mode the warehouse, district and customer aggregates are
/// written as blind deltas; otherwise they are read, modified and written
/// back. The history row is a plain insert either way.
pub fn run_payment<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    tables: &TpccTableInfo,
    input: &PaymentInput,
) -> StoreResult<()> {
    log_trace!("payment w={} d={} c={}", input.w_id, input.d_id, input.c_id);
    let txn = store.begin_txn()?;
    match payment_body(config, store, &txn, tables, input) {
        Ok(()) => store.commit_txn(&txn),
        Err(status) => {
            store.abort_txn(&txn)?;
            Err(status)
        }
    }
}

fn payment_body<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    txn: &S::TxnHandle,
    tables: &TpccTableInfo,
    input: &PaymentInput,
) -> StoreResult<()> {
    let w_key = TpccKey::warehouse(input.w_id);
    let d_key = TpccKey::district(input.d_id, input.w_id);
    let c_key = TpccKey::customer(config, input.c_id, input.c_d_id, input.c_w_id);

    // The history note needs the names only when the rows were read anyway.
    let mut w_name = String::new();
    let mut d_name = String::new();

    if config.use_upserts {
        let ytd = TpccDelta::Ytd(input.h_amount).encode()?;
        store.upsert(txn, tables[TpccTable::Warehouse], w_key.to_bytes(), ytd.clone())?;
        store.upsert(txn, tables[TpccTable::District], d_key.to_bytes(), ytd)?;

        let delta = TpccDelta::Customer(CustomerDelta {
            total_h_amount: input.h_amount,
            total_payment_cnt: 1,
            log: vec![PaymentFragment {
                w_id: input.w_id,
                d_id: input.d_id,
                h_amount: input.h_amount,
            }],
        });
        store.upsert(
            txn,
            tables[TpccTable::Customer],
            c_key.to_bytes(),
            delta.encode()?,
        )?;
    } else {
        let bytes = store.get(txn, tables[TpccTable::Warehouse], &w_key.to_bytes())?;
        let mut warehouse = TpccRow::decode(&bytes)?.into_warehouse()?;
        warehouse.w_ytd += input.h_amount;
        w_name = warehouse.w_name.clone();
        store.insert(
            txn,
            tables[TpccTable::Warehouse],
            w_key.to_bytes(),
            TpccRow::Warehouse(warehouse).encode()?,
        )?;

        let bytes = store.get(txn, tables[TpccTable::District], &d_key.to_bytes())?;
        let mut district = TpccRow::decode(&bytes)?.into_district()?;
        district.d_ytd += input.h_amount;
        d_name = district.d_name.clone();
        store.insert(
            txn,
            tables[TpccTable::District],
            d_key.to_bytes(),
            TpccRow::District(district).encode()?,
        )?;

        let bytes = store.get(txn, tables[TpccTable::Customer], &c_key.to_bytes())?;
        let mut customer = TpccRow::decode(&bytes)?.into_customer()?;
        customer.c_balance -= input.h_amount;
        customer.c_ytd_payment += input.h_amount;
        customer.c_payment_cnt += 1;
        if customer.c_credit.starts_with("BC") {
            let note = payment_note(
                input.c_id,
                input.c_d_id,
                input.c_w_id,
                input.d_id,
                input.w_id,
                input.h_amount,
            );
            customer.c_data = prepend_note(&note, &customer.c_data);
        }
        store.insert(
            txn,
            tables[TpccTable::Customer],
            c_key.to_bytes(),
            TpccRow::Customer(customer).encode()?,
        )?;
    }

    let h_key = TpccKey::history(config, input.c_id, input.c_d_id, input.c_w_id);
    let history = HistoryRow {
        h_c_id: input.c_id,
        h_c_d_id: input.c_d_id,
        h_c_w_id: input.c_w_id,
        h_d_id: input.d_id,
        h_w_id: input.w_id,
        h_date: 2023,
        h_amount: input.h_amount,
        h_data: format!("{}    {}", w_name, d_name),
    };
    store.insert(
        txn,
        tables[TpccTable::History],
        h_key.to_bytes(),
        TpccRow::History(history).encode()?,
    )
}

#[cfg(test)]
mod tests {
    use super::super::loader::tpcc_load_all_tables;
    use super::*;
    use crate::store::MemoryStore;
    use crate::tpcc::TpccMergeOperator;
    use clap::Parser;
    use std::sync::Arc;

    fn setup(use_upserts: bool) -> (TpccConfig, MemoryStore, TpccTableInfo) {
        let mut args = vec!["tpcc", "--max-items", "20", "--cust-per-dist", "10"];
        if use_upserts {
            args.push("--use-upserts");
        }
        let config = TpccConfig::parse_from(args);
        let store = MemoryStore::new();
        let info = tpcc_load_all_tables(&config, &store).unwrap();
        store.set_merge_operator(Arc::new(TpccMergeOperator::new(
            config.cust_per_dist,
            &info,
        )));
        (config, store, info)
    }

    fn input(h_amount: f64) -> PaymentInput {
        PaymentInput {
            w_id: 1,
            d_id: 2,
            c_id: 3,
            c_w_id: 1,
            c_d_id: 2,
            h_amount,
        }
    }

    fn warehouse_ytd(store: &MemoryStore, info: &TpccTableInfo) -> f64 {
        let bytes = store
            .raw_get(info[TpccTable::Warehouse], &TpccKey::warehouse(1).to_bytes())
            .unwrap();
        TpccRow::decode(&bytes).unwrap().into_warehouse().unwrap().w_ytd
    }

    fn customer_balance(config: &TpccConfig, store: &MemoryStore, info: &TpccTableInfo) -> f64 {
        let key = TpccKey::customer(config, 3, 2, 1);
        let bytes = store.raw_get(info[TpccTable::Customer], &key.to_bytes()).unwrap();
        TpccRow::decode(&bytes).unwrap().into_customer().unwrap().c_balance
    }

    #[test]
    fn test_payment_updates_aggregates() {
        let (config, store, info) = setup(false);
        run_payment(&config, &store, &info, &input(100.0)).unwrap();
        run_payment(&config, &store, &info, &input(50.0)).unwrap();
        assert_eq!(warehouse_ytd(&store, &info), 300_150.0);
        assert_eq!(customer_balance(&config, &store, &info), -160.0);
        assert_eq!(store.num_records(info[TpccTable::History]).unwrap(), 1);
    }

    #[test]
    fn test_upsert_mode_matches_read_modify_write() {
        let (rmw_config, rmw_store, rmw_info) = setup(false);
        let (up_config, up_store, up_info) = setup(true);
        for amount in [10.0, 25.5, 300.0] {
            run_payment(&rmw_config, &rmw_store, &rmw_info, &input(amount)).unwrap();
            run_payment(&up_config, &up_store, &up_info, &input(amount)).unwrap();
        }
        assert_eq!(
            warehouse_ytd(&rmw_store, &rmw_info),
            warehouse_ytd(&up_store, &up_info)
        );
        assert_eq!(
            customer_balance(&rmw_config, &rmw_store, &rmw_info),
            customer_balance(&up_config, &up_store, &up_info)
        );
    }
}

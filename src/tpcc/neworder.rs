use super::config::TpccConfig;
use super::keys::{TpccKey, TpccTable};
use super::loader::TpccTableInfo;
use super::merge::{StockDelta, TpccDelta};
use super::params::NewOrderInput;
use super::rows::{NewOrderRow, OrderLineRow, OrderRow, TpccRow};
use crate::log_trace;
use crate::store::{StoreResult, TxnStore};

/// Runs one new-order transaction to completion, returning the order total
/// after warehouse and district tax and the customer discount. The total is
/// a receipt for the caller; it is not persisted.
pub fn run_new_order<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    tables: &TpccTableInfo,
    input: &NewOrderInput,
) -> StoreResult<f64> {
    log_trace!(
        "new order w={} d={} c={} lines={}",
        input.w_id,
        input.d_id,
        input.c_id,
        input.lines.len()
    );
    let txn = store.begin_txn()?;
    match new_order_body(config, store, &txn, tables, input) {
        Ok(total) => {
            store.commit_txn(&txn)?;
            Ok(total)
        }
        Err(status) => {
            store.abort_txn(&txn)?;
            Err(status)
        }
    }
}

fn new_order_body<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    txn: &S::TxnHandle,
    tables: &TpccTableInfo,
    input: &NewOrderInput,
) -> StoreResult<f64> {
    let w_key = TpccKey::warehouse(input.w_id);
    let bytes = store.get(txn, tables[TpccTable::Warehouse], &w_key.to_bytes())?;
    let warehouse = TpccRow::decode(&bytes)?.into_warehouse()?;

    // Claim the next order id and push the district sequence forward.
    let d_key = TpccKey::district(input.d_id, input.w_id);
    let bytes = store.get(txn, tables[TpccTable::District], &d_key.to_bytes())?;
    let mut district = TpccRow::decode(&bytes)?.into_district()?;
    let o_id = district.d_next_o_id + 1;
    district.d_next_o_id = o_id;
    let d_tax = district.d_tax;
    store.insert(
        txn,
        tables[TpccTable::District],
        d_key.to_bytes(),
        TpccRow::District(district).encode()?,
    )?;

    let c_key = TpccKey::customer(config, input.c_id, input.d_id, input.w_id);
    let bytes = store.get(txn, tables[TpccTable::Customer], &c_key.to_bytes())?;
    let customer = TpccRow::decode(&bytes)?.into_customer()?;

    store.insert(
        txn,
        tables[TpccTable::NewOrder],
        TpccKey::new_order(o_id, input.d_id, input.w_id).to_bytes(),
        TpccRow::NewOrder(NewOrderRow {
            no_o_id: o_id,
            no_d_id: input.d_id,
            no_w_id: input.w_id,
        })
        .encode()?,
    )?;

    store.insert(
        txn,
        tables[TpccTable::Order],
        TpccKey::order(o_id, input.d_id, input.w_id).to_bytes(),
        TpccRow::Order(OrderRow {
            o_id,
            o_c_id: input.c_id,
            o_d_id: input.d_id,
            o_w_id: input.w_id,
            o_entry_d: input.o_entry_d,
            o_carrier_id: 0,
            o_ol_cnt: input.lines.len() as u64,
            o_all_local: !input.remote,
        })
        .encode()?,
    )?;

    let mut total_amount = 0.0;
    for (index, line) in input.lines.iter().enumerate() {
        let ol_number = index as u64 + 1;

        let i_key = TpccKey::item(line.ol_i_id);
        let bytes = store.get(txn, tables[TpccTable::Item], &i_key.to_bytes())?;
        let item = TpccRow::decode(&bytes)?.into_item()?;

        let s_key = TpccKey::stock(config, line.ol_i_id, line.ol_supply_w_id);
        let remote_supply = line.ol_supply_w_id != input.w_id;
        if config.use_upserts {
            let delta = TpccDelta::Stock(StockDelta {
                ol_quantity: line.ol_quantity,
                order_cnt: 1,
                remote_cnt: u64::from(remote_supply),
            });
            store.upsert(
                txn,
                tables[TpccTable::Stock],
                s_key.to_bytes(),
                delta.encode()?,
            )?;
        } else {
            let bytes = store.get(txn, tables[TpccTable::Stock], &s_key.to_bytes())?;
            let mut stock = TpccRow::decode(&bytes)?.into_stock()?;
            let quantity = line.ol_quantity as i64;
            if stock.s_quantity >= quantity + 10 {
                stock.s_quantity -= quantity;
            } else {
                stock.s_quantity = stock.s_quantity - quantity + 91;
            }
            stock.s_ytd += line.ol_quantity;
            stock.s_order_cnt += 1;
            if remote_supply {
                stock.s_remote_cnt += 1;
            }
            store.insert(
                txn,
                tables[TpccTable::Stock],
                s_key.to_bytes(),
                TpccRow::Stock(stock).encode()?,
            )?;
        }

        let ol_amount = line.ol_quantity as f64 * item.i_price;
        total_amount += ol_amount;

        store.insert(
            txn,
            tables[TpccTable::OrderLine],
            TpccKey::order_line(o_id, input.d_id, input.w_id, ol_number).to_bytes(),
            TpccRow::OrderLine(OrderLineRow {
                ol_o_id: o_id,
                ol_d_id: input.d_id,
                ol_w_id: input.w_id,
                ol_number,
                ol_i_id: line.ol_i_id,
                ol_supply_w_id: line.ol_supply_w_id,
                ol_delivery_d: 0,
                ol_quantity: line.ol_quantity,
                ol_amount,
                ol_dist_info: String::new(),
            })
            .encode()?,
        )?;
    }

    Ok(total_amount * (1.0 + warehouse.w_tax + d_tax) * (1.0 - customer.c_discount))
}

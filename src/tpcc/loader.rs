use super::config::{TpccConfig, DIST_PER_WARE, MAX_OL_PER_ORDER, MIN_OL_PER_ORDER};
use super::keys::{TpccKey, TpccTable};
use super::params::{make_clast, nurand_int};
use super::rows::{
    CustomerRow, DistrictRow, ItemRow, NewOrderRow, OrderLineRow, OrderRow, StockRow, TpccRow,
    WarehouseRow,
};
use crate::log_info;
use crate::random::{rand_astring, rand_nstring, rng_for_thread, urand_double, urand_int, Permutation};
use crate::store::{StoreResult, StoreStatus, TableId, TxnStore};
use rand::rngs::SmallRng;
use std::collections::HashMap;
use std::ops::Index;

// Orders past this id start undelivered, with a pending new-order row.
const DELIVERED_ORDERS: u64 = 2100;

/// Mapping from logical tables to the backend's table ids.
#[derive(Debug, Clone, Default)]
pub struct TpccTableInfo {
    map: HashMap<TpccTable, TableId>,
}

impl TpccTableInfo {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, table: TpccTable, id: TableId) {
        self.map.insert(table, id);
    }

    pub fn reverse_map(&self) -> HashMap<TableId, TpccTable> {
        self.map.iter().map(|(t, id)| (*id, *t)).collect()
    }
}

impl Index<TpccTable> for TpccTableInfo {
    type Output = TableId;

    fn index(&self, table: TpccTable) -> &TableId {
        self.map.get(&table).unwrap()
    }
}

pub fn tpcc_create_tables<S: TxnStore>(store: &S) -> StoreResult<TpccTableInfo> {
    let mut info = TpccTableInfo::new();
    for table in TpccTable::all() {
        let id = store.create_table(table.name())?;
        info.insert(table, id);
    }
    Ok(info)
}

/// Creates every table and loads the initial database, one thread per
/// warehouse. Thread 0 also loads the shared item table.
pub fn tpcc_load_all_tables<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
) -> StoreResult<TpccTableInfo> {
    let info = tpcc_create_tables(store)?;
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(config.num_warehouses as usize);
        for i in 0..config.num_warehouses {
            let info = &info;
            handles.push(scope.spawn(move || -> StoreResult<()> {
                let mut rng = rng_for_thread(i);
                if i == 0 {
                    load_items(config, store, info, &mut rng)?;
                }
                let w_id = i + 1;
                load_warehouse(store, info, &mut rng, w_id)?;
                load_stock(config, store, info, &mut rng, w_id)?;
                for d_id in 1..=DIST_PER_WARE {
                    load_district(config, store, info, &mut rng, d_id, w_id)?;
                    load_customers(config, store, info, &mut rng, d_id, w_id)?;
                    load_orders(config, store, info, &mut rng, d_id, w_id)?;
                }
                log_info!("warehouse {} loaded", w_id);
                Ok(())
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => return Err(StoreStatus::Error("loader thread panicked".to_string())),
            }
        }
        Ok(())
    })?;
    Ok(info)
}

fn put<S: TxnStore>(
    store: &S,
    table: TableId,
    key: &TpccKey,
    row: &TpccRow,
) -> StoreResult<()> {
    store.raw_store(table, key.to_bytes(), row.encode()?)
}

/// 10% of item and stock data carries the "original" marker.
fn maybe_mark_original(rng: &mut SmallRng, mut data: String) -> String {
    if urand_int(rng, 0u32, 9) == 0 {
        data.replace_range(0..8.min(data.len()), "original");
    }
    data
}

fn load_items<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    info: &TpccTableInfo,
    rng: &mut SmallRng,
) -> StoreResult<()> {
    let table = info[TpccTable::Item];
    for i_id in 1..=config.max_items {
        let row = ItemRow {
            i_id,
            i_im_id: urand_int(rng, 1, 10_000),
            i_name: rand_astring(rng, 14, 24),
            i_price: urand_int(rng, 1u64, 100) as f64,
            i_data: {
                let data = rand_astring(rng, 26, 50);
                maybe_mark_original(rng, data)
            },
        };
        put(store, table, &TpccKey::item(i_id), &TpccRow::Item(row))?;
    }
    Ok(())
}

fn load_warehouse<S: TxnStore>(
    store: &S,
    info: &TpccTableInfo,
    rng: &mut SmallRng,
    w_id: u64,
) -> StoreResult<()> {
    let row = WarehouseRow {
        w_id,
        w_name: rand_astring(rng, 6, 10),
        w_street_1: rand_astring(rng, 10, 20),
        w_street_2: rand_astring(rng, 10, 20),
        w_city: rand_astring(rng, 10, 20),
        w_state: rand_astring(rng, 2, 2),
        w_zip: rand_nstring(rng, 9, 9),
        w_tax: urand_double(rng, 0, 200, 1000),
        w_ytd: 300_000.0,
    };
    put(
        store,
        info[TpccTable::Warehouse],
        &TpccKey::warehouse(w_id),
        &TpccRow::Warehouse(row),
    )
}

fn load_district<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    info: &TpccTableInfo,
    rng: &mut SmallRng,
    d_id: u64,
    w_id: u64,
) -> StoreResult<()> {
    let row = DistrictRow {
        d_id,
        d_w_id: w_id,
        d_name: rand_astring(rng, 6, 10),
        d_street_1: rand_astring(rng, 10, 20),
        d_street_2: rand_astring(rng, 10, 20),
        d_city: rand_astring(rng, 10, 20),
        d_state: rand_astring(rng, 2, 2),
        d_zip: rand_nstring(rng, 9, 9),
        d_tax: urand_double(rng, 0, 200, 1000),
        d_ytd: 30_000.0,
        d_next_o_id: config.cust_per_dist + 1,
    };
    put(
        store,
        info[TpccTable::District],
        &TpccKey::district(d_id, w_id),
        &TpccRow::District(row),
    )
}

fn load_stock<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    info: &TpccTableInfo,
    rng: &mut SmallRng,
    w_id: u64,
) -> StoreResult<()> {
    let table = info[TpccTable::Stock];
    for s_i_id in 1..=config.max_items {
        let row = StockRow {
            s_i_id,
            s_w_id: w_id,
            s_quantity: urand_int(rng, 10i64, 100),
            s_dist: (0..10).map(|_| rand_astring(rng, 24, 24)).collect(),
            s_ytd: 0,
            s_order_cnt: 0,
            s_remote_cnt: 0,
            s_data: {
                let data = rand_astring(rng, 26, 50);
                maybe_mark_original(rng, data)
            },
        };
        put(
            store,
            table,
            &TpccKey::stock(config, s_i_id, w_id),
            &TpccRow::Stock(row),
        )?;
    }
    Ok(())
}

fn load_customers<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    info: &TpccTableInfo,
    rng: &mut SmallRng,
    d_id: u64,
    w_id: u64,
) -> StoreResult<()> {
    let table = info[TpccTable::Customer];
    for c_id in 1..=config.cust_per_dist {
        // The first thousand customers get every distinct last name; the
        // rest draw them with run-phase skew.
        let c_last = if c_id <= 1000 {
            make_clast(c_id - 1)
        } else {
            make_clast(nurand_int::<255, true>(rng, 0, 999))
        };
        let row = CustomerRow {
            c_id,
            c_d_id: d_id,
            c_w_id: w_id,
            c_first: rand_astring(rng, 8, 16),
            c_middle: "OE".to_string(),
            c_last,
            c_street_1: rand_astring(rng, 10, 20),
            c_street_2: rand_astring(rng, 10, 20),
            c_city: rand_astring(rng, 10, 20),
            c_state: rand_astring(rng, 2, 2),
            c_zip: rand_nstring(rng, 9, 9),
            c_phone: rand_nstring(rng, 16, 16),
            c_since: 0,
            c_credit: if urand_int(rng, 0u32, 9) == 0 {
                "BC".to_string()
            } else {
                "GC".to_string()
            },
            c_credit_lim: 50_000.0,
            c_discount: urand_double(rng, 0, 4999, 10_000),
            c_balance: -10.0,
            c_ytd_payment: 10.0,
            c_payment_cnt: 1,
            c_delivery_cnt: 0,
            c_data: rand_astring(rng, 300, 500),
        };
        put(
            store,
            table,
            &TpccKey::customer(config, c_id, d_id, w_id),
            &TpccRow::Customer(row),
        )?;
    }
    Ok(())
}

fn load_orders<S: TxnStore>(
    config: &TpccConfig,
    store: &S,
    info: &TpccTableInfo,
    rng: &mut SmallRng,
    d_id: u64,
    w_id: u64,
) -> StoreResult<()> {
    let order_table = info[TpccTable::Order];
    let line_table = info[TpccTable::OrderLine];
    let new_order_table = info[TpccTable::NewOrder];
    // One initial order per customer, in shuffled customer order.
    let customer_perm = Permutation::new(rng, 1, config.cust_per_dist as usize);
    for o_id in 1..=config.cust_per_dist {
        let o_c_id = customer_perm[(o_id - 1) as usize] as u64;
        let delivered = o_id <= DELIVERED_ORDERS;
        let o_entry_d = 2013;
        let o_ol_cnt = urand_int(rng, MIN_OL_PER_ORDER, MAX_OL_PER_ORDER);
        let order = OrderRow {
            o_id,
            o_c_id,
            o_d_id: d_id,
            o_w_id: w_id,
            o_entry_d,
            o_carrier_id: if delivered { urand_int(rng, 1, 10) } else { 0 },
            o_ol_cnt,
            o_all_local: true,
        };
        put(
            store,
            order_table,
            &TpccKey::order(o_id, d_id, w_id),
            &TpccRow::Order(order),
        )?;

        for ol_number in 1..=o_ol_cnt {
            let line = OrderLineRow {
                ol_o_id: o_id,
                ol_d_id: d_id,
                ol_w_id: w_id,
                ol_number,
                ol_i_id: urand_int(rng, 1, config.max_items),
                ol_supply_w_id: w_id,
                ol_delivery_d: if delivered { o_entry_d } else { 0 },
                ol_quantity: 5,
                ol_amount: urand_double(rng, 1, 999_999, 100),
                ol_dist_info: rand_astring(rng, 24, 24),
            };
            put(
                store,
                line_table,
                &TpccKey::order_line(o_id, d_id, w_id, ol_number),
                &TpccRow::OrderLine(line),
            )?;
        }

        if !delivered {
            let pending = NewOrderRow {
                no_o_id: o_id,
                no_d_id: d_id,
                no_w_id: w_id,
            };
            put(
                store,
                new_order_table,
                &TpccKey::new_order(o_id, d_id, w_id),
                &TpccRow::NewOrder(pending),
            )?;
        }
    }
    Ok(())
}

/// Prints per-table record counts, for a sanity check after loading.
pub fn tpcc_show_table_stats<S: TxnStore>(store: &S, info: &TpccTableInfo) {
    for table in TpccTable::all() {
        match store.num_records(info[table]) {
            Ok(count) => println!("{:>10}: {} records", table.name(), count),
            Err(status) => println!("{:>10}: {}", table.name(), status),
        }
    }
}

use super::keys::{TpccKey, TpccTable};
use super::loader::TpccTableInfo;
use super::rows::{decode_row, encode_row, TpccRow};
use crate::store::{MergeOperator, StoreResult, StoreStatus, TableId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cap on the c_data note, matching the 500-byte column.
pub const MAX_CUSTOMER_DATA: usize = 500;

/// Cap on retained payment fragments per accumulated customer delta.
/// Fragments past the cap are dropped, so a heavily contended customer can
/// lose note lines while the balance totals stay exact.
pub const MAX_CUSTOMER_LOG_RECORDS: usize = 16;

/// One payment's contribution to a customer's c_data note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFragment {
    pub w_id: u64,
    pub d_id: u64,
    pub h_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDelta {
    pub total_h_amount: f64,
    pub total_payment_cnt: u64,
    pub log: Vec<PaymentFragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDelta {
    pub ol_quantity: u64,
    pub order_cnt: u64,
    pub remote_cnt: u64,
}

/// Blind-write delta for the aggregate columns of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TpccDelta {
    /// Warehouse or district year-to-date amount.
    Ytd(f64),
    Customer(CustomerDelta),
    Stock(StockDelta),
}

impl TpccDelta {
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        encode_row(self)
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<TpccDelta> {
        decode_row(bytes)
    }
}

pub(crate) fn payment_note(
    c_id: u64,
    c_d_id: u64,
    c_w_id: u64,
    d_id: u64,
    w_id: u64,
    h_amount: f64,
) -> String {
    format!(
        "| {:4} {:2} {:4} {:2} {:4} ${:7.2}",
        c_id, c_d_id, c_w_id, d_id, w_id, h_amount
    )
}

pub(crate) fn prepend_note(note: &str, c_data: &str) -> String {
    let mut data = note.to_string();
    data.push_str(c_data);
    data.truncate(MAX_CUSTOMER_DATA);
    data
}

/// Resolves [`TpccDelta`] writes. Delta-with-delta merges sum the
/// aggregates and concatenate payment logs newest first; delta-into-base
/// folds the accumulated totals into the stored row.
pub struct TpccMergeOperator {
    tables: HashMap<TableId, TpccTable>,
    cust_per_dist: u64,
}

impl TpccMergeOperator {
    pub fn new(cust_per_dist: u64, info: &TpccTableInfo) -> Self {
        TpccMergeOperator {
            tables: info.reverse_map(),
            cust_per_dist,
        }
    }

    fn table_of(&self, table: TableId) -> StoreResult<TpccTable> {
        self.tables
            .get(&table)
            .copied()
            .ok_or(StoreStatus::TableNotFound)
    }

    fn mismatch(context: &str) -> StoreStatus {
        StoreStatus::InvalidRecord(format!("delta does not match {}", context))
    }
}

impl MergeOperator for TpccMergeOperator {
    fn merge_deltas(
        &self,
        table: TableId,
        _key: &[u8],
        older: &[u8],
        newer: &[u8],
    ) -> StoreResult<Vec<u8>> {
        let older = TpccDelta::decode(older)?;
        let newer = TpccDelta::decode(newer)?;
        let merged = match (self.table_of(table)?, older, newer) {
            (TpccTable::Warehouse, TpccDelta::Ytd(a), TpccDelta::Ytd(b))
            | (TpccTable::District, TpccDelta::Ytd(a), TpccDelta::Ytd(b)) => {
                TpccDelta::Ytd(a + b)
            }
            (TpccTable::Customer, TpccDelta::Customer(a), TpccDelta::Customer(b)) => {
                let mut log = b.log;
                log.extend(a.log);
                log.truncate(MAX_CUSTOMER_LOG_RECORDS);
                TpccDelta::Customer(CustomerDelta {
                    total_h_amount: a.total_h_amount + b.total_h_amount,
                    total_payment_cnt: a.total_payment_cnt + b.total_payment_cnt,
                    log,
                })
            }
            (TpccTable::Stock, TpccDelta::Stock(a), TpccDelta::Stock(b)) => {
                TpccDelta::Stock(StockDelta {
                    ol_quantity: a.ol_quantity + b.ol_quantity,
                    order_cnt: a.order_cnt + b.order_cnt,
                    remote_cnt: a.remote_cnt + b.remote_cnt,
                })
            }
            (t, _, _) => return Err(Self::mismatch(t.name())),
        };
        merged.encode()
    }

    fn apply_delta(
        &self,
        table: TableId,
        key: &[u8],
        base: &[u8],
        delta: &[u8],
    ) -> StoreResult<Vec<u8>> {
        let delta = TpccDelta::decode(delta)?;
        let row = match (self.table_of(table)?, TpccRow::decode(base)?, delta) {
            (TpccTable::Warehouse, TpccRow::Warehouse(mut w), TpccDelta::Ytd(amount)) => {
                w.w_ytd += amount;
                TpccRow::Warehouse(w)
            }
            (TpccTable::District, TpccRow::District(mut d), TpccDelta::Ytd(amount)) => {
                d.d_ytd += amount;
                TpccRow::District(d)
            }
            (TpccTable::Customer, TpccRow::Customer(mut c), TpccDelta::Customer(delta)) => {
                c.c_balance -= delta.total_h_amount;
                c.c_ytd_payment += delta.total_h_amount;
                c.c_payment_cnt += delta.total_payment_cnt;
                if c.c_credit.starts_with("BC") {
                    // The customer triple comes from the key, the paying
                    // warehouse and district from each fragment.
                    let tpcc_key = TpccKey::from_bytes(key)?;
                    let (c_id, c_d_id, c_w_id) = tpcc_key.customer_params(self.cust_per_dist);
                    let mut note = String::new();
                    for fragment in &delta.log {
                        note.push_str(&payment_note(
                            c_id,
                            c_d_id,
                            c_w_id,
                            fragment.d_id,
                            fragment.w_id,
                            fragment.h_amount,
                        ));
                    }
                    c.c_data = prepend_note(&note, &c.c_data);
                }
                TpccRow::Customer(c)
            }
            (TpccTable::Stock, TpccRow::Stock(mut s), TpccDelta::Stock(delta)) => {
                let quantity = delta.ol_quantity as i64;
                // Restock in multiples of 91 whenever the draw would go
                // negative or leave fewer than ten units.
                if s.s_quantity < quantity {
                    s.s_quantity += (quantity + 90) / 91 * 91;
                }
                s.s_quantity -= quantity;
                if s.s_quantity < 10 {
                    s.s_quantity += 91;
                }
                s.s_ytd += delta.ol_quantity;
                s.s_order_cnt += delta.order_cnt;
                s.s_remote_cnt += delta.remote_cnt;
                TpccRow::Stock(s)
            }
            (t, _, _) => return Err(Self::mismatch(t.name())),
        };
        row.encode()
    }
}

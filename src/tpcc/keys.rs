use super::config::{TpccConfig, DIST_PER_WARE, MAX_OL_PER_ORDER};
use crate::store::{StoreResult, StoreStatus};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TpccTable {
    Item = 0,
    Warehouse = 1,
    Stock = 2,
    District = 3,
    Customer = 4,
    History = 5,
    Order = 6,
    NewOrder = 7,
    OrderLine = 8,
}

impl TpccTable {
    pub const COUNT: usize = 9;

    pub fn all() -> [TpccTable; Self::COUNT] {
        [
            TpccTable::Item,
            TpccTable::Warehouse,
            TpccTable::Stock,
            TpccTable::District,
            TpccTable::Customer,
            TpccTable::History,
            TpccTable::Order,
            TpccTable::NewOrder,
            TpccTable::OrderLine,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TpccTable::Item => "item",
            TpccTable::Warehouse => "warehouse",
            TpccTable::Stock => "stock",
            TpccTable::District => "district",
            TpccTable::Customer => "customer",
            TpccTable::History => "history",
            TpccTable::Order => "orders",
            TpccTable::NewOrder => "neworder",
            TpccTable::OrderLine => "orderline",
        }
    }

    fn from_tag(tag: u8) -> StoreResult<TpccTable> {
        Self::all()
            .into_iter()
            .find(|t| *t as u8 == tag)
            .ok_or_else(|| StoreStatus::InvalidRecord(format!("unknown table tag {}", tag)))
    }
}

/// Composite key addressing every row in the flat key namespace. Ids are
/// 1-based; the packing arithmetic relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TpccKey {
    pub table: TpccTable,
    pub key1: u64,
    pub key2: u64,
}

impl TpccKey {
    fn new(table: TpccTable, key1: u64, key2: u64) -> Self {
        TpccKey { table, key1, key2 }
    }

    pub fn item(i_id: u64) -> Self {
        Self::new(TpccTable::Item, i_id, 0)
    }

    pub fn warehouse(w_id: u64) -> Self {
        Self::new(TpccTable::Warehouse, w_id, 0)
    }

    pub fn stock(config: &TpccConfig, s_i_id: u64, s_w_id: u64) -> Self {
        Self::new(TpccTable::Stock, s_w_id * config.max_items + s_i_id, 0)
    }

    pub fn district(d_id: u64, d_w_id: u64) -> Self {
        Self::new(TpccTable::District, d_w_id * DIST_PER_WARE + d_id, 0)
    }

    pub fn customer(config: &TpccConfig, c_id: u64, c_d_id: u64, c_w_id: u64) -> Self {
        Self::new(
            TpccTable::Customer,
            (c_w_id * DIST_PER_WARE + c_d_id) * config.cust_per_dist + c_id,
            0,
        )
    }

    /// History rows reuse the customer packing.
    pub fn history(config: &TpccConfig, c_id: u64, c_d_id: u64, c_w_id: u64) -> Self {
        Self::new(
            TpccTable::History,
            (c_w_id * DIST_PER_WARE + c_d_id) * config.cust_per_dist + c_id,
            0,
        )
    }

    pub fn order(o_id: u64, d_id: u64, w_id: u64) -> Self {
        Self::new(TpccTable::Order, w_id * DIST_PER_WARE + d_id, o_id)
    }

    pub fn new_order(o_id: u64, d_id: u64, w_id: u64) -> Self {
        Self::new(TpccTable::NewOrder, w_id * DIST_PER_WARE + d_id, o_id)
    }

    /// Line numbers run 1..=MAX_OL_PER_ORDER, so the stride leaves room
    /// for the full inclusive range without colliding with the next order.
    pub fn order_line(o_id: u64, d_id: u64, w_id: u64, ol_number: u64) -> Self {
        Self::new(
            TpccTable::OrderLine,
            w_id * DIST_PER_WARE + d_id,
            o_id * (MAX_OL_PER_ORDER + 1) + ol_number,
        )
    }

    /// Inverse of `customer` for valid 1-based ids: (c_id, c_d_id, c_w_id).
    pub fn customer_params(&self, cust_per_dist: u64) -> (u64, u64, u64) {
        let custs = cust_per_dist;
        let mut c_id = self.key1 % custs;
        if c_id == 0 {
            c_id = custs;
        }
        let rest = (self.key1 - c_id) / custs;
        let mut c_d_id = rest % DIST_PER_WARE;
        if c_d_id == 0 {
            c_d_id = DIST_PER_WARE;
        }
        let c_w_id = (rest - c_d_id) / DIST_PER_WARE;
        (c_id, c_d_id, c_w_id)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(17);
        bytes.push(self.table as u8);
        bytes.extend_from_slice(&self.key1.to_be_bytes());
        bytes.extend_from_slice(&self.key2.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> StoreResult<TpccKey> {
        if bytes.len() != 17 {
            return Err(StoreStatus::InvalidRecord(format!(
                "key length {} != 17",
                bytes.len()
            )));
        }
        let table = TpccTable::from_tag(bytes[0])?;
        let mut k1 = [0u8; 8];
        let mut k2 = [0u8; 8];
        k1.copy_from_slice(&bytes[1..9]);
        k2.copy_from_slice(&bytes[9..17]);
        Ok(TpccKey {
            table,
            key1: u64::from_be_bytes(k1),
            key2: u64::from_be_bytes(k2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashSet;

    fn config(warehouses: u64, custs: u64) -> TpccConfig {
        TpccConfig::parse_from([
            "tpcc",
            "--num-warehouses",
            &warehouses.to_string(),
            "--cust-per-dist",
            &custs.to_string(),
        ])
    }

    #[test]
    fn test_customer_key_roundtrip() {
        let cfg = config(3, 50);
        for c_w_id in 1..=3 {
            for c_d_id in 1..=DIST_PER_WARE {
                for c_id in [1, 2, 25, 49, 50] {
                    let key = TpccKey::customer(&cfg, c_id, c_d_id, c_w_id);
                    assert_eq!(key.customer_params(50), (c_id, c_d_id, c_w_id));
                }
            }
        }
    }

    #[test]
    fn test_customer_keys_are_injective() {
        let cfg = config(2, 30);
        let mut seen = HashSet::new();
        for c_w_id in 1..=2 {
            for c_d_id in 1..=DIST_PER_WARE {
                for c_id in 1..=30 {
                    assert!(seen.insert(TpccKey::customer(&cfg, c_id, c_d_id, c_w_id).key1));
                }
            }
        }
    }

    #[test]
    fn test_order_line_keys_do_not_collide_across_orders() {
        let mut seen = HashSet::new();
        for o_id in 1..=100 {
            for ol in 1..=MAX_OL_PER_ORDER {
                let key = TpccKey::order_line(o_id, 1, 1, ol);
                assert!(seen.insert((key.key1, key.key2)));
            }
        }
    }

    #[test]
    fn test_key_bytes_roundtrip() {
        let cfg = config(1, 3000);
        let keys = [
            TpccKey::item(42),
            TpccKey::warehouse(1),
            TpccKey::stock(&cfg, 99, 1),
            TpccKey::district(10, 1),
            TpccKey::customer(&cfg, 3000, 10, 1),
            TpccKey::order(5, 2, 1),
            TpccKey::new_order(5, 2, 1),
            TpccKey::order_line(5, 2, 1, 15),
        ];
        for key in keys {
            assert_eq!(TpccKey::from_bytes(&key.to_bytes()).unwrap(), key);
        }
    }

    #[test]
    fn test_key_bytes_sort_by_table_then_id() {
        let a = TpccKey::order(1, 1, 1).to_bytes();
        let b = TpccKey::order(2, 1, 1).to_bytes();
        assert!(a < b);
        let c = TpccKey::new_order(1, 1, 1).to_bytes();
        assert!(b < c);
    }
}

use crate::store::{StoreResult, StoreStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseRow {
    pub w_id: u64,
    pub w_name: String,
    pub w_street_1: String,
    pub w_street_2: String,
    pub w_city: String,
    pub w_state: String,
    pub w_zip: String,
    pub w_tax: f64,
    pub w_ytd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRow {
    pub d_id: u64,
    pub d_w_id: u64,
    pub d_name: String,
    pub d_street_1: String,
    pub d_street_2: String,
    pub d_city: String,
    pub d_state: String,
    pub d_zip: String,
    pub d_tax: f64,
    pub d_ytd: f64,
    pub d_next_o_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    pub c_id: u64,
    pub c_d_id: u64,
    pub c_w_id: u64,
    pub c_first: String,
    pub c_middle: String,
    pub c_last: String,
    pub c_street_1: String,
    pub c_street_2: String,
    pub c_city: String,
    pub c_state: String,
    pub c_zip: String,
    pub c_phone: String,
    pub c_since: u64,
    pub c_credit: String,
    pub c_credit_lim: f64,
    pub c_discount: f64,
    pub c_balance: f64,
    pub c_ytd_payment: f64,
    pub c_payment_cnt: u64,
    pub c_delivery_cnt: u64,
    pub c_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub h_c_id: u64,
    pub h_c_d_id: u64,
    pub h_c_w_id: u64,
    pub h_d_id: u64,
    pub h_w_id: u64,
    pub h_date: u64,
    pub h_amount: f64,
    pub h_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderRow {
    pub no_o_id: u64,
    pub no_d_id: u64,
    pub no_w_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub o_id: u64,
    pub o_c_id: u64,
    pub o_d_id: u64,
    pub o_w_id: u64,
    pub o_entry_d: u64,
    pub o_carrier_id: u64,
    pub o_ol_cnt: u64,
    pub o_all_local: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineRow {
    pub ol_o_id: u64,
    pub ol_d_id: u64,
    pub ol_w_id: u64,
    pub ol_number: u64,
    pub ol_i_id: u64,
    pub ol_supply_w_id: u64,
    pub ol_delivery_d: u64,
    pub ol_quantity: u64,
    pub ol_amount: f64,
    pub ol_dist_info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub i_id: u64,
    pub i_im_id: u64,
    pub i_name: String,
    pub i_price: f64,
    pub i_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub s_i_id: u64,
    pub s_w_id: u64,
    pub s_quantity: i64,
    pub s_dist: Vec<String>,
    pub s_ytd: u64,
    pub s_order_cnt: u64,
    pub s_remote_cnt: u64,
    pub s_data: String,
}

pub fn encode_row<T: Serialize>(row: &T) -> StoreResult<Vec<u8>> {
    serde_cbor::to_vec(row).map_err(StoreStatus::from)
}

pub fn decode_row<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> StoreResult<T> {
    serde_cbor::from_slice(bytes).map_err(StoreStatus::from)
}

/// Tagged row value. Every stored record carries its variant tag so a read
/// that decodes to the wrong shape fails loudly instead of reinterpreting
/// bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TpccRow {
    Warehouse(WarehouseRow),
    District(DistrictRow),
    Customer(CustomerRow),
    History(HistoryRow),
    NewOrder(NewOrderRow),
    Order(OrderRow),
    OrderLine(OrderLineRow),
    Item(ItemRow),
    Stock(StockRow),
}

macro_rules! row_accessor {
    ($fn_name:ident, $variant:ident, $row:ty) => {
        pub fn $fn_name(self) -> StoreResult<$row> {
            match self {
                TpccRow::$variant(row) => Ok(row),
                other => Err(StoreStatus::InvalidRecord(format!(
                    "expected {} row, found {:?}",
                    stringify!($variant),
                    std::mem::discriminant(&other)
                ))),
            }
        }
    };
}

impl TpccRow {
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        encode_row(self)
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<TpccRow> {
        decode_row(bytes)
    }

    row_accessor!(into_warehouse, Warehouse, WarehouseRow);
    row_accessor!(into_district, District, DistrictRow);
    row_accessor!(into_customer, Customer, CustomerRow);
    row_accessor!(into_order, Order, OrderRow);
    row_accessor!(into_order_line, OrderLine, OrderLineRow);
    row_accessor!(into_new_order, NewOrder, NewOrderRow);
    row_accessor!(into_item, Item, ItemRow);
    row_accessor!(into_stock, Stock, StockRow);
    row_accessor!(into_history, History, HistoryRow);
}

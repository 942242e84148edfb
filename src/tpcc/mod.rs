mod client;
mod config;
mod keys;
mod loader;
mod merge;
mod neworder;
mod params;
mod payment;
mod rows;

pub use client::{run_tpcc_transaction, PerTxnType, TpccStat};
pub use config::{TpccConfig, DIST_PER_WARE, MAX_OL_PER_ORDER, MIN_OL_PER_ORDER};
pub use keys::{TpccKey, TpccTable};
pub use loader::{tpcc_load_all_tables, tpcc_show_table_stats, TpccTableInfo};
pub use merge::{
    CustomerDelta, PaymentFragment, StockDelta, TpccDelta, TpccMergeOperator,
    MAX_CUSTOMER_DATA, MAX_CUSTOMER_LOG_RECORDS,
};
pub use neworder::run_new_order;
pub use params::{home_warehouse, next_txn_kind, NewOrderInput, OrderLineInput, PaymentInput, TxnKind};
pub use payment::run_payment;
pub use rows::{
    decode_row, encode_row, CustomerRow, DistrictRow, HistoryRow, ItemRow, NewOrderRow,
    OrderLineRow, OrderRow, StockRow, TpccRow, WarehouseRow,
};

pub mod prelude {
    pub use super::{
        run_new_order, run_payment, run_tpcc_transaction, tpcc_load_all_tables,
        tpcc_show_table_stats, home_warehouse, next_txn_kind, CustomerDelta, CustomerRow,
        DistrictRow, HistoryRow, ItemRow, NewOrderInput, NewOrderRow, OrderLineInput,
        OrderLineRow, OrderRow, PaymentFragment, PaymentInput, PerTxnType, StockDelta, StockRow,
        TpccConfig, TpccDelta, TpccKey, TpccMergeOperator, TpccRow, TpccStat, TpccTable,
        TpccTableInfo, TxnKind, WarehouseRow, DIST_PER_WARE, MAX_CUSTOMER_DATA,
        MAX_CUSTOMER_LOG_RECORDS, MAX_OL_PER_ORDER, MIN_OL_PER_ORDER,
    };
}

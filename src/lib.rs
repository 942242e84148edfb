pub mod client;
pub mod generator;
pub mod harness;
pub mod random;
pub mod store;
pub mod tpcc;
pub mod workload;

#[doc(hidden)]
pub mod logger;

pub mod prelude {
    pub use crate::client::prelude::*;
    pub use crate::generator::prelude::*;
    pub use crate::harness::prelude::*;
    pub use crate::store::prelude::*;
    pub use crate::tpcc::prelude::*;
    pub use crate::workload::prelude::*;
}

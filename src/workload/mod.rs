mod config;
mod core;

pub use config::{ConfigError, YcsbConfig};
pub use core::{CoreWorkload, WorkloadState, KEY_PREFIX, TABLE_NAME};

pub mod prelude {
    pub use super::{ConfigError, CoreWorkload, WorkloadState, YcsbConfig, KEY_PREFIX, TABLE_NAME};
}

//! Rate table and configuration loading for the `cantax` command.

pub mod config;
pub mod logging;
pub mod loader;

pub use config::{ConfigError, load_config, parse_config};
pub use loader::{RateTableLoader, RateTableLoaderError, RateTableRecord};

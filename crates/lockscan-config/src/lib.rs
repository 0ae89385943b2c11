pub mod manager;
pub mod types;

pub use manager::{ConfigError, ConfigManager, ConfigSource};
pub use types::{AnalysisSettings, CliOverrides, LockscanConfig, MIN_CHAIN_HOPS};

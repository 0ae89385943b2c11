pub mod config;

pub use config::{handle_config_command, run_config_command, ConfigCommand};

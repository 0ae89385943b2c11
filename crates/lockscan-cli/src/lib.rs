//! lockscan CLI library components.
//!
//! This crate provides the command-line interface for lockscan's lockfile
//! analysis. The main binary is in `main.rs`.

pub mod cli;
pub mod commands;
pub mod formatters;
pub mod logging;

pub use cli::analysis::{run_analysis, Analysis, AnalysisRunOptions, OutputFormat};
pub use cli::{run_report, write_report, Report};

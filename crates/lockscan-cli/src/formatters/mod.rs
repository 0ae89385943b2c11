//! Output formatters for lockscan results.

pub mod human;
pub mod json;

use crate::cli::analysis::{Analysis, OutputFormat};
use lockscan_core::DuplicateSummary;
use std::io::{self, Write};

pub use human::HumanFormatter;
pub use json::JsonFormatter;

/// Trait for writing analysis results
pub trait Formatter {
    /// Write the duplicate report
    fn write_duplicates(
        &self,
        analysis: &Analysis,
        summary: &DuplicateSummary,
        out: &mut dyn Write,
    ) -> io::Result<()>;

    /// Write the resolved dependency tree
    fn write_tree(&self, analysis: &Analysis, out: &mut dyn Write) -> io::Result<()>;
}

/// Formatter for `format`.
pub fn formatter_for(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

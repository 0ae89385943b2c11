//! Report commands built on a shared analysis run.

pub mod analysis;

use crate::formatters;
use analysis::{run_analysis, AnalysisRunOptions, OutputFormat};
use anyhow::{Context, Result};
use std::io::Write;

/// What to print once the tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Duplicates,
    Tree,
}

/// Runs the analysis and writes `report` to stdout.
pub fn run_report(report: Report, options: &AnalysisRunOptions, format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_report(report, options, format, &mut out)
}

/// Runs the analysis and writes `report` to `out`.
pub fn write_report(
    report: Report,
    options: &AnalysisRunOptions,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let analysis = run_analysis(options)?;
    let formatter = formatters::formatter_for(format);

    let written = match report {
        Report::Duplicates => {
            let summary = analysis.duplicates();
            formatter.write_duplicates(&analysis, &summary, out)
        }
        Report::Tree => formatter.write_tree(&analysis, out),
    };
    written.context("Failed to write output")?;

    out.flush().context("Failed to write output")
}

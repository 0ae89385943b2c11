//! Human-readable formatter for analysis results.

mod duplicates;
mod tree;

#[cfg(test)]
mod tests;

use super::Formatter;
use crate::cli::analysis::Analysis;
use colored::*;
use lockscan_core::DuplicateSummary;
use std::io::{self, Write};

pub struct HumanFormatter;

impl Formatter for HumanFormatter {
    fn write_duplicates(
        &self,
        analysis: &Analysis,
        summary: &DuplicateSummary,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        print_header(out, analysis, "Duplicate packages")?;
        duplicates::print_duplicates(out, analysis, summary)?;
        print_unresolved(out, analysis)
    }

    fn write_tree(&self, analysis: &Analysis, out: &mut dyn Write) -> io::Result<()> {
        print_header(out, analysis, "Dependency tree")?;
        tree::print_tree(out, &analysis.tree)?;
        print_unresolved(out, analysis)
    }
}

fn print_header(out: &mut dyn Write, analysis: &Analysis, title: &str) -> io::Result<()> {
    let lockfile = analysis
        .lockfile
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| analysis.lockfile.path.display().to_string());
    let source = format!("{} ({})", lockfile, analysis.lockfile.format().id());
    writeln!(out, "{} {} {}", title.bold(), "in".dimmed(), source.cyan())?;
    writeln!(out, "{}", "=".repeat(title.len() + source.len() + 4))?;
    writeln!(out)
}

fn print_unresolved(out: &mut dyn Write, analysis: &Analysis) -> io::Result<()> {
    let unresolved = analysis.tree.unresolved();
    if unresolved.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(
        out,
        "{}",
        format!("Unresolved dependencies ({}):", unresolved.len())
            .yellow()
            .bold()
    )?;
    for dep in unresolved {
        let via = if dep.path.is_empty() {
            "(root)".to_string()
        } else {
            dep.path.join(" > ")
        };
        writeln!(out, "  {}@{}  {} {}", dep.name, dep.range, "via".dimmed(), via)?;
    }
    Ok(())
}

use crate::cli::analysis::Analysis;
use colored::*;
use lockscan_core::{ChainDisplay, DuplicateGroup, DuplicateInstance, DuplicateSummary};
use std::io::{self, Write};

const CHAIN_SEPARATOR: &str = " > ";

pub(super) fn print_duplicates(
    out: &mut dyn Write,
    analysis: &Analysis,
    summary: &DuplicateSummary,
) -> io::Result<()> {
    if summary.is_empty() {
        writeln!(out, "{}", "No duplicate packages found.".green())?;
        return print_summary(out, summary);
    }

    let display = ChainDisplay::new(analysis.settings.max_chain_hops);
    let root = analysis.tree.root();
    let root_label = format!("{}@{}", root.name, root.version);

    for group in &summary.duplicates {
        print_group(out, group, &display, &root_label)?;
        writeln!(out)?;
    }
    print_summary(out, summary)
}

fn print_group(
    out: &mut dyn Write,
    group: &DuplicateGroup,
    display: &ChainDisplay,
    root_label: &str,
) -> io::Result<()> {
    let versions = if group.has_version_conflict() {
        format!("{} versions", group.versions.len()).red()
    } else {
        "same version".yellow()
    };
    writeln!(
        out,
        "{}  {}, {} instances",
        group.name.bold(),
        versions,
        group.instances.len()
    )?;

    for instance in &group.instances {
        print_instance(out, instance, display, root_label)?;
    }
    Ok(())
}

fn print_instance(
    out: &mut dyn Write,
    instance: &DuplicateInstance,
    display: &ChainDisplay,
    root_label: &str,
) -> io::Result<()> {
    let dev = if instance.is_dev_dependency {
        format!(" {}", "(dev)".dimmed())
    } else {
        String::new()
    };
    writeln!(
        out,
        "  {}  {}{}",
        instance.version.cyan(),
        instance.install_location().to_string().dimmed(),
        dev
    )?;

    let mut chain = root_label.to_string();
    if !instance.chain.is_empty() {
        chain.push_str(CHAIN_SEPARATOR);
        chain.push_str(&display.render(&instance.chain, CHAIN_SEPARATOR));
    }
    writeln!(
        out,
        "    {}{}{}@{}",
        chain,
        CHAIN_SEPARATOR,
        instance.name,
        instance.version
    )
}

fn print_summary(out: &mut dyn Write, summary: &DuplicateSummary) -> io::Result<()> {
    writeln!(out, "{}", "Summary:".bold())?;
    writeln!(out, "  Total packages: {}", summary.total_packages)?;
    writeln!(out, "  Duplicated packages: {}", summary.duplicate_packages)?;
    writeln!(
        out,
        "  Duplicate instances: {}",
        summary.total_duplicate_instances
    )
}

//! lockscan CLI - duplicate package finder for JavaScript lockfiles.

use anyhow::Result;
use clap::{Args, Parser};
use lockscan_cli::commands::{self, ConfigCommand};
use lockscan_cli::{logging, run_report, AnalysisRunOptions, Report};
use lockscan_config::CliOverrides;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lockscan", version)]
#[command(about = "Find duplicated packages in npm, yarn, pnpm and bun lockfiles", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    analyze: AnalyzeArgs,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Report packages installed more than once (default)
    Dupes(AnalyzeArgs),

    /// Print the resolved dependency tree
    Tree(AnalyzeArgs),

    /// Manage lockscan configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone)]
struct AnalyzeArgs {
    /// Project directory or lockfile
    ///
    /// Examples:
    ///   lockscan .                     # Find the lockfile in the current directory
    ///   lockscan app/pnpm-lock.yaml    # Analyze a specific lockfile
    #[arg(value_name = "PATH", default_value = ".")]
    path: PathBuf,

    /// Lockfile to read instead of searching PATH
    #[arg(long, value_name = "FILE")]
    lockfile: Option<PathBuf>,

    /// Maximum depth for dependency traversal; lower it for large, densely
    /// connected graphs
    #[arg(long)]
    max_depth: Option<usize>,

    /// Leave out devDependencies of the root
    #[arg(long)]
    no_dev: bool,

    /// Only report packages present in more than one version
    #[arg(long)]
    conflicts_only: bool,

    /// Importer (workspace member) to analyze
    #[arg(long, default_value = ".")]
    importer: String,

    /// Output format
    #[arg(short, long = "output", value_enum, default_value = "human")]
    format: OutputFormat,

    /// Output JSON format (alias for --output json)
    #[arg(long)]
    json: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

impl AnalyzeArgs {
    fn run_options(&self) -> AnalysisRunOptions {
        AnalysisRunOptions {
            path: self.path.clone(),
            lockfile: self.lockfile.clone(),
            config: self.config.clone(),
            overrides: CliOverrides {
                max_depth: self.max_depth,
                include_dev_dependencies: self.no_dev.then_some(false),
                version_conflicts_only: self.conflicts_only.then_some(true),
            },
            importer: self.importer.clone(),
        }
    }

    fn output_format(&self) -> lockscan_cli::OutputFormat {
        if self.json {
            return lockscan_cli::OutputFormat::Json;
        }
        match self.format {
            OutputFormat::Human => lockscan_cli::OutputFormat::Human,
            OutputFormat::Json => lockscan_cli::OutputFormat::Json,
        }
    }

    fn run(&self, report: Report) -> Result<()> {
        run_report(report, &self.run_options(), self.output_format())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Some(Command::Config { command }) => commands::handle_config_command(command),
        Some(Command::Dupes(args)) => args.run(Report::Duplicates),
        Some(Command::Tree(args)) => args.run(Report::Tree),
        None => cli.analyze.run(Report::Duplicates),
    }
}

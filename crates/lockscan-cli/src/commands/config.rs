use anyhow::{Context, Result};
use clap::Subcommand;
use lockscan_config::{ConfigError, ConfigManager};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config file (.lockscan.toml in the project)
    Init {
        /// Project directory
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Write ~/.lockscan/config.toml instead
        #[arg(long)]
        global: bool,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show which config file applies to a project
    Path {
        /// Project directory
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Print the active configuration as TOML
    Show {
        /// Project directory
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Configuration file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn handle_config_command(cmd: ConfigCommand) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_config_command(cmd, &mut out)
}

pub fn run_config_command(cmd: ConfigCommand, out: &mut dyn Write) -> Result<()> {
    match cmd {
        ConfigCommand::Init {
            path,
            global,
            force,
        } => init_config(&path, global, force, out),
        ConfigCommand::Path { path } => show_config_path(&path, out),
        ConfigCommand::Show { path, config } => show_config(&path, config.as_deref(), out),
    }
}

fn init_config(project_dir: &Path, global: bool, force: bool, out: &mut dyn Write) -> Result<()> {
    let config_path = if global {
        ConfigManager::global_config_path()?
    } else {
        ConfigManager::project_config_path(project_dir)
    };

    match ConfigManager::init_at(&config_path, force) {
        Ok(_) => {
            writeln!(out, "✓ Initialized config at: {}", config_path.display())?;
            Ok(())
        }
        Err(ConfigError::ConfigExists(existing)) => {
            writeln!(out, "Config already exists at: {}", existing.display())?;
            writeln!(out, "Pass --force to overwrite it.")?;
            Ok(())
        }
        Err(e) => Err(e)
            .with_context(|| format!("Failed to write config to {}", config_path.display())),
    }
}

fn show_config_path(project_dir: &Path, out: &mut dyn Write) -> Result<()> {
    let manager = ConfigManager::discover(project_dir).context("Failed to load config")?;
    writeln!(out, "Active: {}", manager.source())?;
    writeln!(
        out,
        "Project: {}",
        ConfigManager::project_config_path(project_dir).display()
    )?;
    match ConfigManager::global_config_path() {
        Ok(global) => writeln!(out, "Global: {}", global.display())?,
        Err(_) => writeln!(out, "Global: (no home directory)")?,
    }
    Ok(())
}

fn show_config(project_dir: &Path, config: Option<&Path>, out: &mut dyn Write) -> Result<()> {
    let manager = match config {
        Some(path) => ConfigManager::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigManager::discover(project_dir).context("Failed to load config")?,
    };
    writeln!(out, "# source: {}", manager.source())?;
    write!(out, "{}", manager.to_toml()?)?;
    Ok(())
}

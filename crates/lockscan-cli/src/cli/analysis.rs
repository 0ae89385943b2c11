//! Analysis orchestration: config, lockfile, root dependencies, tree.

use anyhow::{bail, Context, Result};
use lockscan_config::{AnalysisSettings, CliOverrides, ConfigManager, ConfigSource};
use lockscan_core::{
    BuildOptions, DependencyTree, DuplicateDetector, DuplicateSummary, RootDependencies,
    TreeBuilder, DEFAULT_ROOT_NAME,
};
use lockscan_deps::{find_lockfile, load_lockfile, LoadedLockfile, RootManifest};
use std::path::{Path, PathBuf};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Options for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRunOptions {
    /// Project directory, or a lockfile inside one
    pub path: PathBuf,
    pub lockfile: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub overrides: CliOverrides,
    pub importer: String,
}

/// Where the root dependencies came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSource {
    Manifest(PathBuf),
    Importer(String),
}

/// A built tree plus everything needed to report on it.
#[derive(Debug)]
pub struct Analysis {
    pub project_dir: PathBuf,
    pub lockfile: LoadedLockfile,
    pub root_source: RootSource,
    pub settings: AnalysisSettings,
    pub config_source: ConfigSource,
    pub tree: DependencyTree,
}

impl Analysis {
    /// Runs the duplicate detector with the configured policy and drops
    /// ignored package names.
    pub fn duplicates(&self) -> DuplicateSummary {
        let mut summary = DuplicateDetector::new()
            .version_conflicts_only(self.settings.version_conflicts_only)
            .detect(&self.tree);
        if !self.settings.ignore_packages.is_empty() {
            summary.retain(|group| !self.settings.is_ignored(&group.name));
        }
        tracing::info!(
            groups = summary.duplicate_packages,
            instances = summary.total_duplicate_instances,
            "duplicate detection finished"
        );
        summary
    }
}

/// Loads config and lock data and builds the dependency tree.
pub fn run_analysis(options: &AnalysisRunOptions) -> Result<Analysis> {
    let (project_dir, lockfile_path) = resolve_paths(options)?;

    let config = match &options.config {
        Some(path) => ConfigManager::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigManager::discover(&project_dir).context("Failed to load config")?,
    };
    let config_source = config.source().clone();
    let mut settings = config.settings().clone();
    settings.merge_cli(&options.overrides);

    let mut effective = config.config().clone();
    effective.settings = settings.clone();
    effective.validate().context("Invalid analysis settings")?;

    let lockfile = load_lockfile(&lockfile_path)
        .with_context(|| format!("Failed to read lockfile {}", lockfile_path.display()))?;

    let (roots, root_source, root_name, root_version) =
        root_dependencies(&project_dir, &lockfile, &options.importer, &settings)?;
    if roots.is_empty() {
        tracing::warn!("no root dependencies declared");
    }

    let build_options = BuildOptions {
        max_depth: settings.max_depth,
        importer: Some(options.importer.clone()),
        root_name,
        root_version,
    };
    let tree = TreeBuilder::new(lockfile.normalizer.as_ref())
        .with_lock_data(&lockfile.data)
        .with_options(build_options)
        .build(&roots)
        .context("Failed to build dependency tree")?;

    tracing::info!(
        format = %lockfile.format(),
        packages = tree.package_count(),
        nodes = tree.node_count(),
        unresolved = tree.unresolved().len(),
        "dependency tree built"
    );

    Ok(Analysis {
        project_dir,
        lockfile,
        root_source,
        settings,
        config_source,
        tree,
    })
}

/// Splits the positional path and `--lockfile` into a project directory and
/// a lockfile path.
fn resolve_paths(options: &AnalysisRunOptions) -> Result<(PathBuf, PathBuf)> {
    let path = &options.path;
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        let dir = parent_dir(path);
        let lockfile = options.lockfile.clone().unwrap_or_else(|| path.clone());
        return Ok((dir, lockfile));
    }

    let lockfile = match &options.lockfile {
        Some(lockfile) => lockfile.clone(),
        None => find_lockfile(path)
            .with_context(|| format!("No supported lockfile in {}", path.display()))?,
    };
    Ok((path.clone(), lockfile))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Reads the root dependencies from `package.json`, or from the lockfile's
/// importer when the project has no manifest.
fn root_dependencies(
    project_dir: &Path,
    lockfile: &LoadedLockfile,
    importer_id: &str,
    settings: &AnalysisSettings,
) -> Result<(RootDependencies, RootSource, String, String)> {
    let manifest_path = project_dir.join("package.json");
    if manifest_path.is_file() {
        let manifest = RootManifest::from_path(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let name = manifest
            .name
            .clone()
            .unwrap_or_else(|| directory_name(project_dir));
        let version = manifest
            .version
            .clone()
            .unwrap_or_else(|| "0.0.0".to_string());
        return Ok((
            manifest.root_dependencies(settings.include_dev_dependencies),
            RootSource::Manifest(manifest_path),
            name,
            version,
        ));
    }

    let Some(importer) = lockfile.data.importer(importer_id) else {
        bail!(
            "No package.json in {} and the lockfile records no importer '{}'",
            project_dir.display(),
            importer_id
        );
    };
    tracing::debug!(importer = importer_id, "no package.json, using lockfile importer");
    Ok((
        RootDependencies::from_importer(importer, settings.include_dev_dependencies),
        RootSource::Importer(importer_id.to_string()),
        directory_name(project_dir),
        "0.0.0".to_string(),
    ))
}

fn directory_name(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ROOT_NAME.to_string())
}

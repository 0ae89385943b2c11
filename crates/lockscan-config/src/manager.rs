use crate::types::{AnalysisSettings, LockscanConfig};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during config management
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("Config file already exists at {0}")]
    ConfigExists(PathBuf),

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `.lockscan.toml` in the project directory
    Project(PathBuf),
    /// `~/.lockscan/config.toml`
    Global(PathBuf),
    /// An explicit `--config` path
    File(PathBuf),
    /// No file was found
    Defaults,
}

impl ConfigSource {
    /// File the configuration was read from, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Project(path) | ConfigSource::Global(path) | ConfigSource::File(path) => {
                Some(path)
            }
            ConfigSource::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("(built-in defaults)"),
        }
    }
}

/// Manager for lockscan configuration
///
/// Looks for `.lockscan.toml` in the project directory first, then for the
/// user-wide `~/.lockscan/config.toml`, and falls back to defaults.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    source: ConfigSource,
    config: LockscanConfig,
}

impl ConfigManager {
    /// Project-local config file name
    pub const PROJECT_FILE: &'static str = ".lockscan.toml";

    /// Get the global config path (~/.lockscan/config.toml)
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".lockscan").join("config.toml"))
    }

    /// Project-local config path for `project_dir`
    pub fn project_config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(Self::PROJECT_FILE)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = read_config(path)?;
        Ok(Self {
            source: ConfigSource::File(path.to_path_buf()),
            config,
        })
    }

    /// Find the config that applies to `project_dir`
    pub fn discover(project_dir: &Path) -> Result<Self, ConfigError> {
        // A missing home directory only rules out the global file.
        let global = match Self::global_config_path() {
            Ok(path) => Some(path),
            Err(ConfigError::HomeNotFound) => None,
            Err(e) => return Err(e),
        };
        Self::discover_in(project_dir, global.as_deref())
    }

    /// Same as [`ConfigManager::discover`] with an explicit global path
    pub fn discover_in(project_dir: &Path, global: Option<&Path>) -> Result<Self, ConfigError> {
        let project = Self::project_config_path(project_dir);
        if project.is_file() {
            tracing::debug!(path = %project.display(), "using project config");
            return Ok(Self {
                config: read_config(&project)?,
                source: ConfigSource::Project(project),
            });
        }

        if let Some(global) = global.filter(|path| path.is_file()) {
            tracing::debug!(path = %global.display(), "using global config");
            return Ok(Self {
                config: read_config(global)?,
                source: ConfigSource::Global(global.to_path_buf()),
            });
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::defaults())
    }

    /// Built-in settings with no backing file
    pub fn defaults() -> Self {
        Self {
            source: ConfigSource::Defaults,
            config: LockscanConfig::default(),
        }
    }

    /// Write a default config file at `path`
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub fn init_at(path: &Path, force: bool) -> Result<Self, ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::ConfigExists(path.to_path_buf()));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let config = LockscanConfig::default();
        std::fs::write(path, toml::to_string_pretty(&config)?)?;
        tracing::info!(path = %path.display(), "wrote default config");

        Ok(Self {
            source: ConfigSource::File(path.to_path_buf()),
            config,
        })
    }

    /// Get reference to config
    pub fn config(&self) -> &LockscanConfig {
        &self.config
    }

    /// Get mutable reference to config
    pub fn config_mut(&mut self) -> &mut LockscanConfig {
        &mut self.config
    }

    /// Shortcut for the analysis settings
    pub fn settings(&self) -> &AnalysisSettings {
        &self.config.settings
    }

    /// Where the config was read from
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Render the active config as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.config)?)
    }
}

fn read_config(path: &Path) -> Result<LockscanConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let config: LockscanConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_init_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let manager = ConfigManager::init_at(&config_path, false).unwrap();
        assert_eq!(manager.config().version, "1.0");

        let loaded = ConfigManager::load_from(&config_path).unwrap();
        assert_eq!(loaded.config(), manager.config());
        assert_eq!(loaded.source(), &ConfigSource::File(config_path));
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[settings]\nmax_depth = 3\n").unwrap();

        let result = ConfigManager::init_at(&config_path, false);
        assert!(matches!(result, Err(ConfigError::ConfigExists(_))));

        ConfigManager::init_at(&config_path, true).unwrap();
        let loaded = ConfigManager::load_from(&config_path).unwrap();
        assert_eq!(loaded.settings().max_depth, 32);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConfigManager::load_from(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "[settings]\nmax_depth = 0\n").unwrap();
        assert!(matches!(
            ConfigManager::load_from(&config_path),
            Err(ConfigError::Invalid { .. })
        ));

        fs::write(&config_path, "[settings\n").unwrap();
        assert!(matches!(
            ConfigManager::load_from(&config_path),
            Err(ConfigError::TomlDe(_))
        ));
    }

    #[test]
    fn test_discover_prefers_project_file() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let global = home.path().join("config.toml");
        fs::write(&global, "[settings]\nmax_depth = 5\n").unwrap();

        let manager = ConfigManager::discover_in(project.path(), Some(&global)).unwrap();
        assert_eq!(manager.source(), &ConfigSource::Global(global.clone()));
        assert_eq!(manager.settings().max_depth, 5);

        let local = ConfigManager::project_config_path(project.path());
        fs::write(&local, "[settings]\nmax_depth = 7\n").unwrap();

        let manager = ConfigManager::discover_in(project.path(), Some(&global)).unwrap();
        assert_eq!(manager.source(), &ConfigSource::Project(local));
        assert_eq!(manager.settings().max_depth, 7);
    }

    #[test]
    fn test_discover_falls_back_to_defaults() {
        let project = TempDir::new().unwrap();
        let missing = project.path().join("no-such-global.toml");

        let manager = ConfigManager::discover_in(project.path(), Some(&missing)).unwrap();
        assert_eq!(manager.source(), &ConfigSource::Defaults);
        assert_eq!(manager.source().to_string(), "(built-in defaults)");
        assert_eq!(manager.config(), &LockscanConfig::default());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut manager = ConfigManager::defaults();
        manager
            .config_mut()
            .settings
            .ignore_packages
            .push("tslib".to_string());

        let rendered = manager.to_toml().unwrap();
        assert!(rendered.contains("ignore_packages"));
        let parsed: LockscanConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(&parsed, manager.config());
    }
}

use crate::manager::ConfigError;
use lockscan_core::{DEFAULT_MAX_CHAIN_HOPS, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};

/// Fewest chain hops a display limit may allow: three are kept at each end.
pub const MIN_CHAIN_HOPS: usize = 6;

/// Main configuration structure for lockscan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockscanConfig {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: String,

    /// Analysis settings
    #[serde(default)]
    pub settings: AnalysisSettings,
}

impl Default for LockscanConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            settings: AnalysisSettings::default(),
        }
    }
}

impl LockscanConfig {
    /// Rejects settings no analysis can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "settings.max_depth",
                message: "must be at least 1".to_string(),
            });
        }
        if self.settings.max_chain_hops < MIN_CHAIN_HOPS {
            return Err(ConfigError::Invalid {
                field: "settings.max_chain_hops",
                message: format!("must be at least {}", MIN_CHAIN_HOPS),
            });
        }
        Ok(())
    }
}

/// Settings for tree building and duplicate reporting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSettings {
    /// Deepest tree level to expand (direct dependencies are level 1)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Include devDependencies of the root
    #[serde(default = "default_true")]
    pub include_dev_dependencies: bool,

    /// Only report packages present in more than one version
    #[serde(default)]
    pub version_conflicts_only: bool,

    /// Longest ancestor chain shown before eliding the middle
    #[serde(default = "default_max_chain_hops")]
    pub max_chain_hops: usize,

    /// Package names left out of the duplicate report
    #[serde(default)]
    pub ignore_packages: Vec<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            include_dev_dependencies: default_true(),
            version_conflicts_only: false,
            max_chain_hops: default_max_chain_hops(),
            ignore_packages: Vec::new(),
        }
    }
}

impl AnalysisSettings {
    /// Applies command line values on top of file settings.
    pub fn merge_cli(&mut self, overrides: &CliOverrides) {
        if let Some(max_depth) = overrides.max_depth {
            self.max_depth = max_depth;
        }
        if let Some(include_dev) = overrides.include_dev_dependencies {
            self.include_dev_dependencies = include_dev;
        }
        if let Some(conflicts_only) = overrides.version_conflicts_only {
            self.version_conflicts_only = conflicts_only;
        }
    }

    /// Whether `name` is excluded from the duplicate report
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_packages.iter().any(|ignored| ignored == name)
    }
}

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// `--max-depth`
    pub max_depth: Option<usize>,
    /// `--no-dev` sets this to `Some(false)`
    pub include_dev_dependencies: Option<bool>,
    /// `--conflicts-only` sets this to `Some(true)`
    pub version_conflicts_only: Option<bool>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_chain_hops() -> usize {
    DEFAULT_MAX_CHAIN_HOPS
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = LockscanConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let deserialized: LockscanConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_default_config() {
        let config = LockscanConfig::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.settings.max_depth, 32);
        assert!(config.settings.include_dev_dependencies);
        assert!(!config.settings.version_conflicts_only);
        assert_eq!(config.settings.max_chain_hops, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: LockscanConfig = toml::from_str(
            r#"
[settings]
version_conflicts_only = true
ignore_packages = ["tslib"]
"#,
        )
        .unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.settings.max_depth, 32);
        assert!(config.settings.version_conflicts_only);
        assert!(config.settings.is_ignored("tslib"));
        assert!(!config.settings.is_ignored("react"));
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let mut config = LockscanConfig::default();
        config.settings.max_depth = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "settings.max_depth", .. })
        ));

        let mut config = LockscanConfig::default();
        config.settings.max_chain_hops = 5;
        assert!(config.validate().is_err());
        config.settings.max_chain_hops = 6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut settings = AnalysisSettings::default();
        settings.merge_cli(&CliOverrides {
            max_depth: Some(4),
            include_dev_dependencies: Some(false),
            version_conflicts_only: None,
        });
        assert_eq!(settings.max_depth, 4);
        assert!(!settings.include_dev_dependencies);
        assert!(!settings.version_conflicts_only);
    }
}

//! package.json reader

use super::string_map;
use lockscan_core::{DependencyKind, Error, Result, RootDependencies};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Dependency declarations of a project's `package.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootManifest {
    /// Manifest path.
    pub path: PathBuf,
    /// `name` field.
    pub name: Option<String>,
    /// `version` field.
    pub version: Option<String>,
    sections: Vec<(DependencyKind, Vec<(String, String)>)>,
}

impl RootManifest {
    /// Reads and parses `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be read, [`Error::Json`] when it is
    /// not valid JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parses manifest content. `path` is only used for error reporting.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let pkg: Value = serde_json::from_str(content).map_err(|source| Error::Json {
            file: path.to_path_buf(),
            source,
        })?;

        let sections = DependencyKind::all()
            .iter()
            .map(|kind| {
                let declared = string_map(pkg.get(kind.manifest_field()), kind.manifest_field())
                    .into_iter()
                    .map(|(name, range)| (name.to_string(), range.to_string()))
                    .collect();
                (*kind, declared)
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            name: pkg.get("name").and_then(Value::as_str).map(str::to_string),
            version: pkg.get("version").and_then(Value::as_str).map(str::to_string),
            sections,
        })
    }

    /// Declarations of one manifest section, in file order.
    pub fn section(&self, kind: DependencyKind) -> &[(String, String)] {
        self.sections
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, deps)| deps.as_slice())
            .unwrap_or(&[])
    }

    /// Merged root declarations: `dependencies`, `devDependencies`,
    /// `peerDependencies`, `optionalDependencies`, first occurrence of a
    /// name winning. With `include_dev` off the dev section is skipped
    /// entirely.
    pub fn root_dependencies(&self, include_dev: bool) -> RootDependencies {
        let mut deps = RootDependencies::new();
        for (kind, declared) in &self.sections {
            if *kind == DependencyKind::Development && !include_dev {
                continue;
            }
            for (name, range) in declared {
                deps.push(name.clone(), range.clone(), *kind);
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
{
  "name": "test",
  "version": "1.0.0",
  "dependencies": {
    "react": "^18.0.0",
    "lodash": "^4.17.0"
  },
  "devDependencies": {
    "typescript": "^5.0.0",
    "react": "^17.0.0"
  },
  "peerDependencies": {
    "react-dom": "^18.0.0",
    "broken": { "version": "1.0.0" }
  },
  "optionalDependencies": {
    "fsevents": "^2.3.0"
  }
}
"#;

    #[test]
    fn test_parse_package_json() {
        let temp_dir = TempDir::new().unwrap();
        let package_json = temp_dir.path().join("package.json");
        std::fs::write(&package_json, MANIFEST).unwrap();

        let manifest = RootManifest::from_path(&package_json).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("test"));
        assert_eq!(manifest.version.as_deref(), Some("1.0.0"));
        assert_eq!(manifest.section(DependencyKind::Peer).len(), 1);

        let deps = manifest.root_dependencies(true);
        let merged: Vec<_> = deps
            .iter()
            .map(|d| (d.name.as_str(), d.range.as_str(), d.is_dev()))
            .collect();
        assert_eq!(
            merged,
            vec![
                ("react", "^18.0.0", false),
                ("lodash", "^4.17.0", false),
                ("typescript", "^5.0.0", true),
                ("react-dom", "^18.0.0", false),
                ("fsevents", "^2.3.0", false),
            ]
        );
    }

    #[test]
    fn test_excluding_dev_dependencies() {
        let manifest = RootManifest::parse(MANIFEST, Path::new("package.json")).unwrap();
        let deps = manifest.root_dependencies(false);
        assert!(!deps.contains("typescript"));
        assert_eq!(deps.len(), 4);
    }

    #[test]
    fn test_invalid_json() {
        let err = RootManifest::parse("{ \"name\": ", Path::new("pkg/package.json")).unwrap_err();
        match err {
            Error::Json { file, .. } => assert_eq!(file, PathBuf::from("pkg/package.json")),
            other => panic!("expected JSON error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = RootManifest::from_path(&temp_dir.path().join("package.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_manifest_without_dependencies() {
        let manifest = RootManifest::parse(r#"{"name": "empty"}"#, Path::new("package.json")).unwrap();
        assert!(manifest.root_dependencies(true).is_empty());
    }
}

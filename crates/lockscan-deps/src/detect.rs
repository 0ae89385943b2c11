//! Lockfile discovery and normalizer selection

use crate::bun::BunNormalizer;
use crate::npm::{NpmFlatNormalizer, NpmNestedNormalizer};
use crate::pnpm::PnpmNormalizer;
use crate::yarn::YarnNormalizer;
use lockscan_core::{Error, LockFormat, LockfileNormalizer, NormalizedLockData, Result};
use std::path::{Path, PathBuf};

/// Returns the normalizer for `format`.
pub fn normalizer_for(format: LockFormat) -> Box<dyn LockfileNormalizer> {
    match format {
        LockFormat::NpmNested => Box::new(NpmNestedNormalizer::new()),
        LockFormat::NpmFlat => Box::new(NpmFlatNormalizer::new()),
        LockFormat::Yarn => Box::new(YarnNormalizer::new()),
        LockFormat::Pnpm => Box::new(PnpmNormalizer::new()),
        LockFormat::Bun => Box::new(BunNormalizer::new()),
    }
}

/// Finds the lockfile in `dir`, probing bun, pnpm, yarn, npm-shrinkwrap and
/// package-lock in that order.
///
/// # Errors
///
/// [`Error::LockfileNotFound`] when none of them exists.
pub fn find_lockfile(dir: &Path) -> Result<PathBuf> {
    LockFormat::file_names()
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::LockfileNotFound {
            searched: dir.to_path_buf(),
        })
}

/// A lockfile read from disk and normalized.
#[derive(Debug)]
pub struct LoadedLockfile {
    /// Where the lockfile was read from.
    pub path: PathBuf,
    /// Normalizer matching the detected format.
    pub normalizer: Box<dyn LockfileNormalizer>,
    /// Normalized content.
    pub data: NormalizedLockData,
}

impl LoadedLockfile {
    /// Detected format.
    pub fn format(&self) -> LockFormat {
        self.data.format()
    }
}

/// Reads `path`, detects its format from the file name and content, and
/// normalizes it.
///
/// # Errors
///
/// [`Error::Io`] if the file cannot be read, [`Error::UnsupportedLockfile`]
/// for unknown file names, [`Error::Parse`] for invalid content.
pub fn load_lockfile(path: &Path) -> Result<LoadedLockfile> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::UnsupportedLockfile {
            file_name: path.display().to_string(),
        })?;
    let content = std::fs::read_to_string(path)?;
    let format = LockFormat::detect(file_name, &content)?;
    let normalizer = normalizer_for(format);

    tracing::debug!(path = %path.display(), %format, "normalizing lockfile");
    let data = normalizer.normalize(&content)?;
    if data.is_empty() {
        tracing::warn!(path = %path.display(), "lockfile contains no packages");
    }

    Ok(LoadedLockfile {
        path: path.to_path_buf(),
        normalizer,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalizer_for_every_format() {
        for format in LockFormat::all() {
            assert_eq!(normalizer_for(*format).format(), *format);
        }
    }

    #[test]
    fn test_find_lockfile_priority() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("package-lock.json"), "{}").unwrap();
        std::fs::write(temp_dir.path().join("yarn.lock"), "").unwrap();

        let found = find_lockfile(temp_dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "yarn.lock");
    }

    #[test]
    fn test_find_lockfile_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = find_lockfile(temp_dir.path()).unwrap_err();
        assert!(matches!(err, Error::LockfileNotFound { .. }));
    }

    #[test]
    fn test_load_detects_npm_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package-lock.json");
        std::fs::write(
            &path,
            r#"{"lockfileVersion": 1, "dependencies": {"a": {"version": "1.0.0"}}}"#,
        )
        .unwrap();

        let loaded = load_lockfile(&path).unwrap();
        assert_eq!(loaded.format(), LockFormat::NpmNested);
        assert_eq!(loaded.data.len(), 1);
    }

    #[test]
    fn test_load_unsupported_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Cargo.lock");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            load_lockfile(&path),
            Err(Error::UnsupportedLockfile { .. })
        ));
    }
}

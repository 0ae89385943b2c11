//! Error types for lockscan core.

use crate::types::LockFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for lockscan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while normalizing lockfiles or building trees.
///
/// Per-package problems (a dependency with no matching lock entry, a
/// malformed record inside an otherwise valid lockfile) are not errors: they
/// are logged and the affected branch or record is skipped.
#[derive(Debug, Error)]
pub enum Error {
    /// The lockfile is not valid syntax for its format.
    #[error("Failed to parse {format} lockfile: {message}")]
    Parse {
        /// Format the content was parsed as.
        format: LockFormat,
        /// Description of the syntax problem.
        message: String,
    },

    /// JSON parsing error (package.json).
    #[error("JSON parse error in {file}: {source}")]
    Json {
        /// Path to the JSON file with the error.
        file: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// A tree build was attempted without normalized lock data.
    #[error("No lock data available to build from")]
    NoLockData,

    /// Depth bound must allow at least the direct dependencies.
    #[error("Invalid max depth {value}: must be at least 1")]
    InvalidMaxDepth {
        /// The rejected value.
        value: usize,
    },

    /// File name does not correspond to a known lockfile format.
    #[error("Unsupported lockfile: {file_name}")]
    UnsupportedLockfile {
        /// The file name that was not recognised.
        file_name: String,
    },

    /// No lockfile exists in the searched directory.
    #[error("No lockfile found in {searched}")]
    LockfileNotFound {
        /// Directory that was searched.
        searched: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Parse`] value.
    pub fn parse(format: LockFormat, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            message: message.into(),
        }
    }
}

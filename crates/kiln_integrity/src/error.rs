//! Error types for integrity checks.

use std::path::PathBuf;

/// Errors that stop an audit outright.
///
/// Semantic problems (unsatisfied constraints, hash mismatches, missing
/// imports) are reported in the audit report instead.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// Reading the workspace, lock file or cache failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The lock file exists but is not a valid lock document.
    #[error("failed to parse lock file {path}: {reason}")]
    LockParse {
        /// The lock file.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// Writing the lock file failed to serialize.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },

    /// No cache root could be determined.
    #[error("cannot locate the package cache: set KILN_PACKAGE_CACHE or HOME")]
    NoCacheRoot,
}

impl IntegrityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IntegrityError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for filesystem failures.
    pub fn is_io(&self) -> bool {
        matches!(self, IntegrityError::Io { .. })
    }
}

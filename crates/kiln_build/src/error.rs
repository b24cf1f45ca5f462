//! Error types for planning and compilation.

use std::path::PathBuf;

/// Infrastructure failures that stop a build.
///
/// Front-end, capability and backend faults are diagnostics, not errors.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Reading a source or package root failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing a build artifact failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A document could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },

    /// The worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    Pool(String),
}

impl BuildError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Write {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the failure happened while writing artifacts.
    pub fn is_write(&self) -> bool {
        matches!(self, BuildError::Write { .. } | BuildError::Serialization { .. })
    }
}

/// Writes `contents` to `workspace/rel`, creating parent directories.
pub(crate) fn write_artifact(
    workspace: &std::path::Path,
    rel: &std::path::Path,
    contents: impl AsRef<[u8]>,
) -> Result<(), BuildError> {
    let path = workspace.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::write(parent, e))?;
    }
    std::fs::write(&path, contents).map_err(|e| BuildError::write(&path, e))
}

//! Error types for manifest operations.

use kiln_integrity::IntegrityError;
use std::path::PathBuf;

/// Errors that can occur while reading or writing the manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// An I/O error occurred while reading the prior manifest, walking the
    /// build tree or writing the new manifest.
    #[error("manifest I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },

    /// Hashing an artifact failed.
    #[error(transparent)]
    Digest(#[from] IntegrityError),
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::Io {
            path: path.into(),
            source,
        }
    }
}

//! Error types for workspace loading and validation.

use kiln_common::ParseEnvError;

/// Errors that can occur when loading or validating a `kiln.toml` workspace.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the workspace file.
    #[error("failed to read workspace: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse workspace: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A package import entry is malformed.
    #[error("invalid import '{entry}' in package '{package}': {reason}")]
    InvalidImport {
        /// The declaring package.
        package: String,
        /// The entry as written.
        entry: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An environment is not an `os/arch` pair.
    #[error(transparent)]
    InvalidEnv(#[from] ParseEnvError),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Returns `true` when the failure came from the filesystem rather than
    /// from the workspace content.
    pub fn is_io(&self) -> bool {
        matches!(self, ConfigError::IoError(_))
    }
}

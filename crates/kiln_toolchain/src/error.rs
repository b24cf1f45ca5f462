//! Error types for tool invocation.

use std::path::PathBuf;

/// Errors raised while running external tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Preparing an output location failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The link worker pool could not be created.
    #[error("failed to start link pool: {0}")]
    Pool(String),
}

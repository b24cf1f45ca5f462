//! Error types for the driver.
//!
//! Almost every failure of a build is a diagnostic on the stream. These are
//! the few that cannot be, because the stream itself or its sinks failed.

use std::path::PathBuf;

/// Errors that escape a driver command.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The activity log could not be opened.
    #[error("failed to open activity log {path}: {source}")]
    ActivityLog {
        /// The log file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Flushing the diagnostic stream failed.
    #[error("failed to flush diagnostics: {0}")]
    Flush(#[source] std::io::Error),
}

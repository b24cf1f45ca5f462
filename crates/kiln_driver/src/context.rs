//! The per-build context.
//!
//! A [`BuildContext`] owns the diagnostic stream of one command. Verbose
//! builds additionally open an activity log below the debug tree; every
//! gate after that runs with a subscriber writing to it, worker threads
//! included.

use crate::error::DriverError;
use kiln_diagnostics::{Diagnostic, DiagnosticStream, ExitCategory};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;

/// Diagnostics and logging for one command.
pub struct BuildContext {
    workspace: PathBuf,
    stream: DiagnosticStream,
    activity: Option<Dispatch>,
}

impl BuildContext {
    /// Creates a context for the workspace at `workspace`.
    pub fn new(workspace: impl Into<PathBuf>, stream: DiagnosticStream) -> Self {
        Self {
            workspace: workspace.into(),
            stream,
            activity: None,
        }
    }

    /// The workspace directory.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// The diagnostic stream.
    pub fn stream(&self) -> &DiagnosticStream {
        &self.stream
    }

    /// Emits one diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        self.stream.emit(diag);
    }

    /// Opens the activity log at the workspace-relative `rel`, truncating
    /// any previous log.
    pub fn open_activity_log(&mut self, rel: &Path) -> Result<(), DriverError> {
        let path = self.workspace.join(rel);
        let open = |path: &Path| -> std::io::Result<File> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            File::create(path)
        };
        let file = open(&path).map_err(|source| DriverError::ActivityLog {
            path: path.clone(),
            source,
        })?;

        let subscriber = tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        self.activity = Some(Dispatch::new(subscriber));
        Ok(())
    }

    /// The activity log subscriber, if one is open.
    pub fn dispatch(&self) -> Option<Dispatch> {
        self.activity.clone()
    }

    /// Runs `f` with the activity log as the default subscriber.
    pub fn scoped<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.activity {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    /// Flushes the stream and closes the activity log.
    pub fn finish(self) -> Result<ExitCategory, DriverError> {
        self.stream.flush().map_err(DriverError::Flush)?;
        Ok(self.stream.exit_category())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_diagnostics::codes;

    #[test]
    fn activity_log_captures_scoped_events() {
        let dir = tempfile::tempdir().unwrap();
        let (stream, _) = DiagnosticStream::capture();
        let mut ctx = BuildContext::new(dir.path(), stream);
        assert!(ctx.dispatch().is_none());

        ctx.open_activity_log(Path::new("build/debug/activity.log")).unwrap();
        ctx.scoped(|| tracing::info!(unit = "main", "compiled unit"));
        ctx.finish().unwrap();

        let log = fs::read_to_string(dir.path().join("build/debug/activity.log")).unwrap();
        assert!(log.contains("compiled unit"));
        assert!(log.contains("unit=\"main\""));
    }

    #[test]
    fn finish_reports_exit_category() {
        let (stream, out) = DiagnosticStream::capture();
        let ctx = BuildContext::new(".", stream);
        ctx.emit(Diagnostic::error(codes::HASH_MISMATCH, "hash mismatch"));
        assert_eq!(ctx.finish().unwrap(), ExitCategory::Integrity);
        assert!(out.contents().contains("E305"));
    }
}

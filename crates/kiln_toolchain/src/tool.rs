//! The external process port.

use crate::error::ToolError;
use std::path::Path;
use std::process::{Command, Stdio};

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

impl ToolOutput {
    /// Returns `true` if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external programs.
///
/// Implementations are synchronous and must be callable from several worker
/// threads at once.
pub trait ToolInvoker: Send + Sync {
    /// Runs `program` with `args` in `cwd` and waits for it to finish.
    ///
    /// A non-zero exit is not an error; callers inspect [`ToolOutput::status`].
    fn invoke(&self, program: &str, args: &[String], cwd: &Path)
        -> Result<ToolOutput, ToolError>;
}

/// Runs programs as child processes, capturing both output streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

impl ToolInvoker for ProcessInvoker {
    fn invoke(&self, program: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, ToolError> {
        tracing::debug!(program, ?args, cwd = %cwd.display(), "invoking tool");
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ToolError::Spawn {
                program: program.to_string(),
                source,
            })?;
        let result = ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(program, status = ?result.status, "tool finished");
        Ok(result)
    }
}

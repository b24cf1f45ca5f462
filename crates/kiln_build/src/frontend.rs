//! The language front-end port.
//!
//! The driver treats the front-end as a black box: given a source unit it
//! returns either an intermediate representation or a list of diagnostics.
//! [`ExternalFrontEnd`] runs the configured front-end executable.

use crate::unit::SourceUnit;
use kiln_common::Env;
use kiln_diagnostics::data::ToolFailure;
use kiln_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticData, FaultClass, Position};
use kiln_toolchain::ToolInvoker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The trust level a unit declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trust {
    /// May use every declared capability.
    #[default]
    Trusted,
    /// May not use capability-gated operations.
    Untrusted,
}

impl fmt::Display for Trust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trust::Trusted => f.write_str("trusted"),
            Trust::Untrusted => f.write_str("untrusted"),
        }
    }
}

/// A capability-relevant operation used by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationUse {
    /// Qualified operation name, e.g. `io.Read`.
    pub name: String,
    /// Where it is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

/// The intermediate representation of one unit plus what capability
/// enforcement needs to know about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitIr {
    /// IR text.
    pub ir: String,
    /// Syntax tree dump, written only in verbose builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<serde_json::Value>,
    /// Declared trust level.
    #[serde(default)]
    pub trust: Trust,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Capability-relevant operations used.
    #[serde(default)]
    pub operations: Vec<OperationUse>,
}

/// What the front-end produced for one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompileOutput {
    /// IR, absent when compilation failed.
    #[serde(default)]
    pub ir: Option<UnitIr>,
    /// Diagnostics, propagated verbatim.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// One front-end invocation.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Workspace directory.
    pub workspace: &'a Path,
    /// Package owning the unit.
    pub package: &'a str,
    /// The unit.
    pub unit: &'a SourceUnit,
    /// Environment compiled for.
    pub env: &'a Env,
}

/// Compiles source units to IR.
pub trait FrontEnd: Send + Sync {
    /// Compiles one unit. Failures are reported as diagnostics.
    fn compile(&self, request: &CompileRequest<'_>) -> CompileOutput;

    /// Names the compiler producing the IR. Object indices record it, and
    /// a unit is recompiled when it changes.
    fn identity(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl CompileOutput {
    /// Returns `true` if any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }
}

/// Keeps a front-end diagnostic inside the 6xx range.
///
/// A code from another range would be classified as a driver fault, so it is
/// replaced by [`codes::FRONTEND_UNCLASSIFIED`] of the same category and the
/// original code is kept in the message.
pub fn confine_code(mut diag: Diagnostic) -> Diagnostic {
    if diag.code.class() == FaultClass::FrontEnd {
        return diag;
    }
    tracing::warn!(code = %diag.code, "front-end reported a code outside its range");
    diag.message = format!("{} (reported as {})", diag.message, diag.code);
    diag.code = DiagnosticCode::new(diag.code.category, codes::FRONTEND_UNCLASSIFIED.number);
    diag
}

/// Runs `<program> compile --env <os/arch> --package <name> <unit>` in the
/// workspace and decodes a [`CompileOutput`] from its stdout.
pub struct ExternalFrontEnd {
    program: String,
    invoker: Arc<dyn ToolInvoker>,
}

impl ExternalFrontEnd {
    /// Creates a front-end running `program` through `invoker`.
    pub fn new(program: impl Into<String>, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            program: program.into(),
            invoker,
        }
    }

    fn failure(
        &self,
        request: &CompileRequest<'_>,
        args: Vec<String>,
        message: String,
        status: Option<i32>,
        stderr: String,
    ) -> CompileOutput {
        let diag = Diagnostic::error(codes::FRONTEND_TOOL_FAILED, message)
            .with_package(request.package)
            .with_file(request.unit.source.to_string_lossy())
            .with_data(DiagnosticData::ToolFailure(ToolFailure {
                tool: self.program.clone(),
                args,
                env: Some(request.env.to_string()),
                output: None,
                status,
                stderr,
            }));
        CompileOutput {
            ir: None,
            diagnostics: vec![diag],
        }
    }
}

impl FrontEnd for ExternalFrontEnd {
    fn identity(&self) -> String {
        self.program.clone()
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileOutput {
        let args = vec![
            "compile".to_string(),
            "--env".to_string(),
            request.env.to_string(),
            "--package".to_string(),
            request.package.to_string(),
            request.unit.source.to_string_lossy().into_owned(),
        ];
        let output = match self.invoker.invoke(&self.program, &args, request.workspace) {
            Ok(output) => output,
            Err(e) => return self.failure(request, args, e.to_string(), None, String::new()),
        };
        // A front-end reports source errors on stdout with a non-zero status,
        // so the document is decoded before the status is judged.
        let empty = |out: &CompileOutput| out.ir.is_none() && !out.has_errors();
        match serde_json::from_str::<CompileOutput>(&output.stdout) {
            Ok(mut decoded) if output.success() && empty(&decoded) => {
                let failure = self.failure(
                    request,
                    args,
                    format!("{} produced no IR and no errors", self.program),
                    output.status,
                    output.stderr,
                );
                decoded.diagnostics.extend(failure.diagnostics);
                decoded
            }
            Ok(decoded) if output.success() || !decoded.diagnostics.is_empty() => decoded,
            Ok(_) => self.failure(
                request,
                args,
                format!("{} exited with {:?} and no diagnostics", self.program, output.status),
                output.status,
                output.stderr,
            ),
            Err(e) => self.failure(
                request,
                args,
                format!("{} produced unreadable output: {e}", self.program),
                output.status,
                output.stderr,
            ),
        }
    }
}

//! Structured diagnostic messages with codes, subjects and payloads.

use crate::code::DiagnosticCode;
use crate::data::DiagnosticData;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A source position: 1-based line and column plus 0-based byte offset.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Position {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
    /// 0-based byte offset into the file.
    pub offset: u32,
}

impl Position {
    /// Creates a position.
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

/// A single structured report of a warning, error or informational event.
///
/// Diagnostics are plain values built by any stage of the driver and handed
/// to the [`DiagnosticStream`](crate::DiagnosticStream), which stamps them
/// into immutable records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    #[serde(rename = "level")]
    pub severity: Severity,
    /// The stable code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// Human-readable message.
    pub message: String,
    /// The package the diagnostic concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// The subject file, workspace-relative where possible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Start position inside `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    /// End position inside `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pos: Option<Position>,
    /// Typed payload for tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DiagnosticData>,
}

impl Diagnostic {
    /// Creates a diagnostic with the given severity, code and message.
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            package: None,
            file: None,
            pos: None,
            end_pos: None,
            data: None,
        }
    }

    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, code, message)
    }

    /// Creates an informational diagnostic.
    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    /// Sets the package this diagnostic concerns.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Sets the subject file.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets the start position.
    pub fn with_pos(mut self, pos: Position) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Sets the end position.
    pub fn with_end_pos(mut self, pos: Position) -> Self {
        self.end_pos = Some(pos);
        self
    }

    /// Attaches a structured payload.
    pub fn with_data(mut self, data: impl Into<DiagnosticData>) -> Self {
        self.data = Some(data.into());
        self
    }
}

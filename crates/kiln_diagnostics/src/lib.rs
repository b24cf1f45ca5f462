//! Structured diagnostics, the diagnostic stream, and exit classification.
//!
//! Every anomaly the driver observes becomes a [`Diagnostic`] with a stable
//! [`DiagnosticCode`] and an optional typed [`DiagnosticData`] payload. The
//! [`DiagnosticStream`] stamps each one into a schema-tagged
//! [`DiagnosticRecord`], serializes concurrent emitters, and renders records
//! as human text or JSON Lines. The worst fault seen decides the
//! [`ExitCategory`] of the invocation.

#![warn(missing_docs)]

pub mod code;
pub mod codes;
pub mod data;
pub mod diagnostic;
pub mod exit;
pub mod record;
pub mod renderer;
pub mod severity;
pub mod stream;

pub use code::{Category, DiagnosticCode, FaultClass, ParseCodeError};
pub use data::DiagnosticData;
pub use diagnostic::{Diagnostic, Position};
pub use exit::ExitCategory;
pub use record::{DiagnosticRecord, RECORD_SCHEMA};
pub use renderer::{DiagnosticRenderer, JsonLinesRenderer, TextRenderer};
pub use severity::Severity;
pub use stream::{DiagnosticStream, MemoryWriter};

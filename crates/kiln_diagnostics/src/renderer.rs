//! Rendering of diagnostic records for humans and for tooling.

use crate::data::DiagnosticData;
use crate::record::DiagnosticRecord;
use crate::severity::Severity;

/// Trait for rendering records into output lines.
///
/// The returned string has no trailing newline; the stream adds one.
pub trait DiagnosticRenderer: Send + Sync {
    /// Renders a single record.
    fn render(&self, record: &DiagnosticRecord) -> String;
}

/// Renders records in a rustc-style terminal format.
///
/// ```text
/// error[E701]: linking failed for linux/amd64
///   --> build/linux/amd64/app
///    = package: app
///    = stderr:
///      ld: undefined symbol _main
/// ```
pub struct TextRenderer {
    /// Whether to use ANSI color codes.
    pub color: bool,
}

impl TextRenderer {
    /// Creates a new text renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, record: &DiagnosticRecord) -> String {
        let label = format!("{}[{}]", record.level, record.code);
        if !self.color {
            return label;
        }
        let ansi = match record.level {
            Severity::Error => "\x1b[1;31m",
            Severity::Warn => "\x1b[1;33m",
            Severity::Info => "\x1b[1;36m",
        };
        format!("{ansi}{label}\x1b[0m")
    }
}

impl DiagnosticRenderer for TextRenderer {
    fn render(&self, record: &DiagnosticRecord) -> String {
        let mut out = format!("{}: {}", self.header(record), record.message);

        if let Some(file) = &record.file {
            match record.pos {
                Some(pos) => out.push_str(&format!("\n  --> {file}:{}:{}", pos.line, pos.column)),
                None => out.push_str(&format!("\n  --> {file}")),
            }
        }
        if let Some(package) = &record.package {
            out.push_str(&format!("\n   = package: {package}"));
        }

        match &record.data {
            Some(DiagnosticData::LinkFailure(failure))
            | Some(DiagnosticData::ToolFailure(failure)) => {
                let command = std::iter::once(failure.tool.as_str())
                    .chain(failure.args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ");
                out.push_str(&format!("\n   = command: {command}"));
                if !failure.stderr.is_empty() {
                    out.push_str("\n   = stderr:");
                    for line in failure.stderr.lines() {
                        out.push_str(&format!("\n     {line}"));
                    }
                }
            }
            Some(DiagnosticData::IntegrityItem(item)) => {
                if let (Some(expected), Some(actual)) = (&item.expected, &item.actual) {
                    out.push_str(&format!("\n   = expected: {expected}"));
                    out.push_str(&format!("\n   = actual:   {actual}"));
                }
            }
            Some(DiagnosticData::ManifestMismatch(m)) => {
                let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "none".to_string());
                out.push_str(&format!("\n   = recorded: {}", show(&m.recorded)));
                out.push_str(&format!("\n   = current:  {}", show(&m.current)));
            }
            _ => {}
        }
        out
    }
}

/// Renders each record as one line of JSON.
pub struct JsonLinesRenderer;

impl DiagnosticRenderer for JsonLinesRenderer {
    fn render(&self, record: &DiagnosticRecord) -> String {
        match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, code = %record.code, "failed to serialize diagnostic");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;
    use crate::data::ToolFailure;
    use crate::diagnostic::{Diagnostic, Position};
    use chrono::Utc;

    fn stamp(diag: Diagnostic) -> DiagnosticRecord {
        DiagnosticRecord::stamp(diag, Utc::now())
    }

    #[test]
    fn text_header_and_location() {
        let rec = stamp(
            Diagnostic::error(codes::TRUST_VIOLATION, "net.Dial not allowed in untrusted unit")
                .with_file("src/main.kiln")
                .with_pos(Position::new(7, 3, 88)),
        );
        let text = TextRenderer::new(false).render(&rec);
        assert!(text.starts_with("error[E502]: net.Dial not allowed"));
        assert!(text.contains("--> src/main.kiln:7:3"));
    }

    #[test]
    fn text_includes_full_stderr() {
        let rec = stamp(
            Diagnostic::error(codes::LINK_FAILED, "linking failed").with_data(
                DiagnosticData::LinkFailure(ToolFailure {
                    tool: "clang".into(),
                    args: vec!["-o".into(), "app".into()],
                    env: None,
                    output: None,
                    status: Some(1),
                    stderr: "line one\nline two\n".into(),
                }),
            ),
        );
        let text = TextRenderer::new(false).render(&rec);
        assert!(text.contains("command: clang -o app"));
        assert!(text.contains("     line one"));
        assert!(text.contains("     line two"));
    }

    #[test]
    fn colored_header_resets() {
        let rec = stamp(Diagnostic::warning(codes::PACKAGE_ROOT_ALIAS, "alias"));
        let text = TextRenderer::new(true).render(&rec);
        assert!(text.starts_with("\x1b[1;33mwarning[W403]\x1b[0m"));
    }

    #[test]
    fn json_line_is_single_line() {
        let rec = stamp(Diagnostic::info(codes::BUILD_OK, "build ok\nwith newline"));
        let line = JsonLinesRenderer.render(&rec);
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["code"], "I901");
    }
}

//! The single ordered diagnostic sink of a build invocation.

use crate::code::FaultClass;
use crate::diagnostic::Diagnostic;
use crate::exit::ExitCategory;
use crate::record::DiagnosticRecord;
use crate::renderer::{DiagnosticRenderer, JsonLinesRenderer, TextRenderer};
use crate::severity::Severity;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct StreamState {
    out: Box<dyn Write + Send>,
    records: Vec<DiagnosticRecord>,
}

/// A thread-safe stream of diagnostic records.
///
/// Every emitted diagnostic is stamped, rendered and written as one line
/// while holding a single lock, so concurrent emitters always produce a
/// valid line-delimited stream. Records are also retained so the caller can
/// classify the invocation once the build ends.
pub struct DiagnosticStream {
    state: Mutex<StreamState>,
    renderer: Box<dyn DiagnosticRenderer>,
    min_level: Severity,
    error_count: AtomicUsize,
    warning_count: AtomicUsize,
}

impl DiagnosticStream {
    /// Creates a stream writing rendered records to `out`.
    pub fn new(out: Box<dyn Write + Send>, renderer: Box<dyn DiagnosticRenderer>) -> Self {
        Self {
            state: Mutex::new(StreamState {
                out,
                records: Vec::new(),
            }),
            renderer,
            min_level: Severity::Info,
            error_count: AtomicUsize::new(0),
            warning_count: AtomicUsize::new(0),
        }
    }

    /// A JSON Lines stream over `out`.
    pub fn json_lines(out: Box<dyn Write + Send>) -> Self {
        Self::new(out, Box::new(JsonLinesRenderer))
    }

    /// A human-readable stream over `out`.
    pub fn text(out: Box<dyn Write + Send>, color: bool) -> Self {
        Self::new(out, Box::new(TextRenderer::new(color)))
    }

    /// A JSON Lines stream whose output can be read back.
    pub fn capture() -> (Self, MemoryWriter) {
        let writer = MemoryWriter::default();
        (Self::json_lines(Box::new(writer.clone())), writer)
    }

    /// Suppresses rendering of records below `level`; they are still retained.
    pub fn with_min_level(mut self, level: Severity) -> Self {
        self.min_level = level;
        self
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stamps and writes a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
            }
            Severity::Warn => {
                self.warning_count.fetch_add(1, Ordering::Relaxed);
            }
            Severity::Info => {}
        }

        let record = DiagnosticRecord::stamp(diag, chrono::Utc::now());
        let mut state = self.lock();
        if record.level >= self.min_level {
            let line = self.renderer.render(&record);
            if let Err(e) = writeln!(state.out, "{line}") {
                tracing::warn!(error = %e, code = %record.code, "failed to write diagnostic");
            }
        }
        state.records.push(record);
    }

    /// Emits every diagnostic in order.
    pub fn emit_all(&self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.emit(diag);
        }
    }

    /// Flushes the underlying writer.
    pub fn flush(&self) -> io::Result<()> {
        self.lock().out.flush()
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Number of warnings emitted so far.
    pub fn warning_count(&self) -> usize {
        self.warning_count.load(Ordering::Relaxed)
    }

    /// Snapshot of all records emitted so far.
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.lock().records.clone()
    }

    /// The most severe exit category implied by the errors emitted so far.
    pub fn exit_category(&self) -> ExitCategory {
        self.lock()
            .records
            .iter()
            .filter(|r| r.level.is_error())
            .map(|r| ExitCategory::for_class(r.code.class()))
            .max()
            .unwrap_or(ExitCategory::Ok)
    }

    /// Returns `true` if an error of the given class has been emitted.
    pub fn has_error_in(&self, class: FaultClass) -> bool {
        self.lock()
            .records
            .iter()
            .any(|r| r.level.is_error() && r.code.class() == class)
    }
}

/// A cloneable in-memory writer, used to read back a captured stream.
#[derive(Clone, Default)]
pub struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl MemoryWriter {
    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// The written output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

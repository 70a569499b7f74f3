//! Development-time console sink. One line per record.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::log::LogEntry;
use super::metric::Metric;
use super::payload::FlushPayload;
use super::span::Span;

/// Writes `[TRACE]`, `[METRIC]`, `[LEVEL]` and `[FLUSH]` lines.
///
/// Write failures are ignored: the console is a mirror, never the record.
pub struct ConsoleExporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleExporter").finish_non_exhaustive()
    }
}

impl Default for ConsoleExporter {
    fn default() -> Self {
        Self::stdout()
    }
}

impl ConsoleExporter {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn export_span(&self, span: &Span) {
        self.write_line(&format_span(span));
    }

    pub fn export_metric(&self, metric: &Metric) {
        self.write_line(&format!("[METRIC] {}: {}", metric.name, metric.value));
    }

    pub fn export_log(&self, entry: &LogEntry) {
        self.write_line(&format!(
            "[{}] {}",
            entry.level.as_str().to_ascii_uppercase(),
            entry.message
        ));
    }

    pub fn export_flush(&self, payload: &FlushPayload) {
        self.write_line(&format!(
            "[FLUSH] {} spans, {} metrics, {} logs",
            payload.spans.len(),
            payload.metrics.len(),
            payload.logs.len()
        ));
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

fn format_span(span: &Span) -> String {
    format!(
        "[TRACE] {} ({:.2}ms) - {}",
        span.name,
        span.duration_ms(),
        span.status
    )
}

/// Cloneable in-memory writer, for capturing console output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(|e| e.into_inner())).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

//! Trace context: the trace/span pair new spans and logs nest under.
//!
//! Each [`Telemetry`](super::Telemetry) owns one current context. Starting a
//! span overwrites it; callers that need a different parent pass one
//! explicitly through [`StartSpanOptions::parent`](super::StartSpanOptions).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
        }
    }

    /// Render as a W3C `traceparent` header value (sampled flag set).
    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }

    /// Parse a W3C `traceparent` header value.
    ///
    /// Returns `None` for malformed input or the all-zero ids the format
    /// reserves as invalid.
    pub fn from_traceparent(header: &str) -> Option<Self> {
        let mut parts = header.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if version.len() != 2 || flags.len() != 2 || parts.next().is_some() {
            return None;
        }
        if !is_hex_id(trace_id, 32) || !is_hex_id(span_id, 16) {
            return None;
        }

        Some(Self::new(
            trace_id.to_ascii_lowercase(),
            span_id.to_ascii_lowercase(),
        ))
    }
}

fn is_hex_id(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit()) && s.chars().any(|c| c != '0')
}

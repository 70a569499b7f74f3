//! Trace and span identifiers.
//!
//! Trace ids are 16 random bytes (32 hex chars), span ids 8 random bytes
//! (16 hex chars), matching the W3C/OTLP widths. All-zero ids are invalid
//! in `traceparent` and are never produced.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; N];
    loop {
        rng.fill(&mut bytes[..]);
        if bytes.iter().any(|b| *b != 0) {
            return bytes;
        }
    }
}

/// Generate a 32-character hex trace id.
pub fn generate_trace_id() -> String {
    hex::encode(random_bytes::<16>())
}

/// Generate a 16-character hex span id.
pub(crate) fn generate_span_id() -> String {
    hex::encode(random_bytes::<8>())
}

/// Handle returned by `start_span`.
///
/// An empty id means the span was sampled out. Passing it to `end_span`,
/// `add_span_event` or `set_span_attribute` is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(String);

impl SpanId {
    /// The id handed out when sampling rejects a span.
    pub fn unsampled() -> Self {
        Self(String::new())
    }

    pub(crate) fn new(id: String) -> Self {
        Self(id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpanId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for SpanId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! Span records.
//!
//! ```text
//! start_span ──► active (mutable through its id)
//!                  │  add_span_event / set_span_attribute
//!                  ▼
//! end_span ────► ended(ok | error) ──► completed queue ──► flush
//! ```
//!
//! A sampled-out span is never created. An ended span is no longer in the
//! active map, so ending or mutating it twice is a no-op by construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::attributes::{AttributeValue, Attributes};

/// Role of the span in the trace, OTLP naming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Client,
    Server,
    #[default]
    Internal,
    Producer,
    Consumer,
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpanKind::Client => "client",
            SpanKind::Server => "server",
            SpanKind::Internal => "internal",
            SpanKind::Producer => "producer",
            SpanKind::Consumer => "consumer",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpanStatus::Unset => "unset",
            SpanStatus::Ok => "ok",
            SpanStatus::Error => "error",
        })
    }
}

impl std::str::FromStr for SpanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unset" => Ok(SpanStatus::Unset),
            "ok" => Ok(SpanStatus::Ok),
            "error" => Ok(SpanStatus::Error),
            other => Err(format!("unknown span status: {other}")),
        }
    }
}

/// Timestamped annotation on an active span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,

    /// Monotonic milliseconds, same clock as the span's start/end
    pub timestamp: f64,

    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// One timed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// 32-char hex, shared by every span in the trace
    pub trace_id: String,

    /// 16-char hex
    pub span_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,

    pub name: String,

    pub kind: SpanKind,

    /// Monotonic milliseconds at start
    pub start_time: f64,

    /// Monotonic milliseconds at end, set by `end_span`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,

    /// `end_time - start_time` in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    pub status: SpanStatus,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default)]
    pub events: Vec<SpanEvent>,
}

impl Span {
    pub(crate) fn new(
        trace_id: String,
        span_id: String,
        parent_span_id: Option<String>,
        name: String,
        kind: SpanKind,
        attributes: Attributes,
        start_time: f64,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id,
            name,
            kind,
            start_time,
            end_time: None,
            duration: None,
            status: SpanStatus::Unset,
            attributes,
            events: Vec::new(),
        }
    }

    pub(crate) fn add_event(&mut self, name: String, timestamp: f64, attributes: Attributes) {
        self.events.push(SpanEvent {
            name,
            timestamp,
            attributes,
        });
    }

    pub(crate) fn set_attribute(&mut self, key: String, value: AttributeValue) {
        self.attributes.insert(key, value);
    }

    /// Seal the span. The end time is clamped so it never precedes the start.
    pub(crate) fn finish(&mut self, end_time: f64, status: SpanStatus) {
        let end_time = end_time.max(self.start_time);
        self.end_time = Some(end_time);
        self.duration = Some(end_time - self.start_time);
        self.status = status;
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Duration in milliseconds, zero while the span is active
    pub fn duration_ms(&self) -> f64 {
        self.duration.unwrap_or(0.0)
    }
}

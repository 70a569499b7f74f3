//! Flush payload: the unit persisted to the store and the shape a collector
//! would receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::log::LogEntry;
use super::metric::Metric;
use super::span::Span;

/// Service identity stamped on every flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushPayload {
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub spans: Vec<Span>,

    #[serde(default)]
    pub metrics: Vec<Metric>,

    #[serde(default)]
    pub logs: Vec<LogEntry>,

    pub resource: Resource,
}

impl FlushPayload {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.metrics.is_empty() && self.logs.is_empty()
    }

    /// Total number of records carried.
    pub fn len(&self) -> usize {
        self.spans.len() + self.metrics.len() + self.logs.len()
    }
}

//! Filtering, pagination and summaries over persisted flush payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::telemetry::{FlushPayload, LogEntry, LogLevel, Span, SpanStatus};

/// Log filter. Every set field must match.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Entries at this level or more severe
    pub min_level: Option<LogLevel>,
    pub trace_id: Option<String>,
    /// Case-insensitive substring of the message
    pub contains: Option<String>,
    pub pattern: Option<Regex>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl LogQuery {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(min) = self.min_level {
            if entry.level < min {
                return false;
            }
        }

        if let Some(ref trace_id) = self.trace_id {
            if entry.trace_id.as_deref() != Some(trace_id.as_str()) {
                return false;
            }
        }

        if let Some(ref needle) = self.contains {
            if !entry
                .message
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }

        if let Some(ref pattern) = self.pattern {
            if !pattern.is_match(&entry.message) {
                return false;
            }
        }

        if self.since.is_some_and(|since| entry.timestamp < since) {
            return false;
        }
        if self.until.is_some_and(|until| entry.timestamp > until) {
            return false;
        }

        true
    }
}

/// Span filter. Every set field must match.
#[derive(Debug, Clone, Default)]
pub struct SpanQuery {
    pub name_contains: Option<String>,
    pub status: Option<SpanStatus>,
    pub min_duration_ms: Option<f64>,
    pub trace_id: Option<String>,
}

impl SpanQuery {
    pub fn matches(&self, span: &Span) -> bool {
        if let Some(ref needle) = self.name_contains {
            if !span.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if self.status.is_some_and(|status| span.status != status) {
            return false;
        }
        if self
            .min_duration_ms
            .is_some_and(|min| span.duration_ms() < min)
        {
            return false;
        }
        if let Some(ref trace_id) = self.trace_id {
            if &span.trace_id != trace_id {
                return false;
            }
        }
        true
    }
}

/// Query engine over a slice of stored payloads (oldest first, as loaded).
pub struct StoreQuery<'a> {
    payloads: &'a [FlushPayload],
}

impl<'a> StoreQuery<'a> {
    pub fn new(payloads: &'a [FlushPayload]) -> Self {
        Self { payloads }
    }

    /// Matching log entries, newest flush first.
    pub fn logs(&self, query: &LogQuery) -> Vec<&'a LogEntry> {
        self.payloads
            .iter()
            .rev()
            .flat_map(|payload| payload.logs.iter())
            .filter(|entry| query.matches(entry))
            .collect()
    }

    /// Matching spans, newest flush first.
    pub fn spans(&self, query: &SpanQuery) -> Vec<&'a Span> {
        self.payloads
            .iter()
            .rev()
            .flat_map(|payload| payload.spans.iter())
            .filter(|span| query.matches(span))
            .collect()
    }

    /// Every span and log entry that belongs to one trace.
    pub fn trace(&self, trace_id: &str) -> (Vec<&'a Span>, Vec<&'a LogEntry>) {
        let spans = self.spans(&SpanQuery {
            trace_id: Some(trace_id.to_string()),
            ..Default::default()
        });
        let logs = self.logs(&LogQuery {
            trace_id: Some(trace_id.to_string()),
            ..Default::default()
        });
        (spans, logs)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Cut `items` into pages and return page `page` (1-based).
///
/// Page 0 is treated as page 1 and `page_size == 0` as 1. A page past the
/// end has no items.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(page_size);

    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        page_size,
        total,
        total_pages,
    }
}

/// Aggregate counts across stored payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    pub flushes: usize,
    pub spans: usize,
    pub errored_spans: usize,
    pub metrics: usize,
    pub logs: usize,
    pub logs_by_level: BTreeMap<LogLevel, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub fn summarize(payloads: &[FlushPayload]) -> StoreSummary {
    let mut summary = StoreSummary {
        flushes: payloads.len(),
        ..Default::default()
    };

    for payload in payloads {
        summary.spans += payload.spans.len();
        summary.errored_spans += payload
            .spans
            .iter()
            .filter(|span| span.status == SpanStatus::Error)
            .count();
        summary.metrics += payload.metrics.len();
        summary.logs += payload.logs.len();
        for entry in &payload.logs {
            *summary.logs_by_level.entry(entry.level).or_insert(0) += 1;
        }

        summary.oldest = Some(match summary.oldest {
            Some(oldest) => oldest.min(payload.timestamp),
            None => payload.timestamp,
        });
        summary.newest = Some(match summary.newest {
            Some(newest) => newest.max(payload.timestamp),
            None => payload.timestamp,
        });
    }

    summary
}

//! The telemetry buffer.
//!
//! Producers append spans, metrics and logs to in-memory queues; `flush`
//! drains all three at once into a [`FlushPayload`] and hands it to the
//! [`PayloadStore`] (and the console sink when enabled).
//!
//! ## Lifecycle
//!
//! 1. Built explicitly with [`Telemetry::builder`] and passed to consumers
//! 2. Optional background flushing via `start_flush_timer()`
//! 3. Eager flush whenever a queue reaches `batch_size`
//! 4. `destroy()` stops the timer and flushes what is left
//!
//! ## Drop Guard
//!
//! When the last handle is dropped without `destroy()`, pending records are
//! still flushed. Active (unended) spans are never flushed.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::Result;

use super::attributes::{AttributeValue, Attributes, Labels};
use super::clock::{Clock, SystemClock};
use super::config::TelemetryConfig;
use super::console::ConsoleExporter;
use super::context::TraceContext;
use super::ids::{generate_span_id, generate_trace_id, SpanId};
use super::log::{LogEntry, LogLevel};
use super::metric::{Metric, MetricType};
use super::payload::{FlushPayload, Resource};
use super::sampler::Sampler;
use super::span::{Span, SpanKind, SpanStatus};
use super::store::{MemoryStore, PayloadStore};

/// Options for [`Telemetry::start_span`].
#[derive(Debug, Clone, Default)]
pub struct StartSpanOptions {
    pub kind: SpanKind,
    pub attributes: Attributes,
    /// Explicit parent span id. Without one the span is a child of the
    /// current span, or a trace root when there is no current context.
    pub parent_span_id: Option<String>,
    /// Explicit parent context; takes precedence over the buffer's current
    /// context for the trace id.
    pub parent: Option<TraceContext>,
}

impl StartSpanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_parent_span_id(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    pub fn with_parent(mut self, parent: TraceContext) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Queue lengths awaiting the next flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub spans: usize,
    pub metrics: usize,
    pub logs: usize,
}

impl PendingCounts {
    pub fn is_empty(&self) -> bool {
        self.spans == 0 && self.metrics == 0 && self.logs == 0
    }
}

#[derive(Debug, Default)]
pub(super) struct BufferState {
    active: HashMap<String, Span>,
    spans: Vec<Span>,
    metrics: Vec<Metric>,
    logs: Vec<LogEntry>,
    current: Option<TraceContext>,
}

pub(super) struct Inner {
    pub(super) config: TelemetryConfig,
    resource: Resource,
    sampler: Sampler,
    clock: Arc<dyn Clock>,
    store: Arc<dyn PayloadStore>,
    console: Option<ConsoleExporter>,
    state: Mutex<BufferState>,
    pub(super) timer: Mutex<Option<JoinHandle<()>>>,
    pub(super) destroyed: AtomicBool,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, BufferState> {
        // A panicking producer must not take telemetry down with it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(super) fn flush(&self) -> Option<FlushPayload> {
        let payload = {
            let mut state = self.state();
            if state.spans.is_empty() && state.metrics.is_empty() && state.logs.is_empty() {
                return None;
            }
            FlushPayload {
                timestamp: self.clock.now(),
                spans: std::mem::take(&mut state.spans),
                metrics: std::mem::take(&mut state.metrics),
                logs: std::mem::take(&mut state.logs),
                resource: self.resource.clone(),
            }
        };

        debug!(
            spans = payload.spans.len(),
            metrics = payload.metrics.len(),
            logs = payload.logs.len(),
            "Flushing telemetry"
        );

        if let Err(e) = self.store.append(&payload) {
            warn!("Failed to persist telemetry flush: {}", e);
        }

        if let Some(ref console) = self.console {
            console.export_flush(&payload);
        }

        Some(payload)
    }

    pub(super) fn stop_timer(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_timer();
        // Best-effort; flush never panics or returns an error
        self.flush();
    }
}

/// Handle to a telemetry buffer. Cloning is cheap and every clone shares the
/// same queues.
#[derive(Clone)]
pub struct Telemetry {
    pub(super) inner: Arc<Inner>,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("resource", &self.inner.resource)
            .field("pending", &self.pending_counts())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Telemetry`].
pub struct TelemetryBuilder {
    config: TelemetryConfig,
    store: Option<Arc<dyn PayloadStore>>,
    clock: Option<Arc<dyn Clock>>,
    console: Option<ConsoleExporter>,
}

impl TelemetryBuilder {
    /// Where flushes are persisted. Defaults to an in-memory store.
    pub fn store(mut self, store: impl PayloadStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn PayloadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Console sink destination, used when `enable_console_exporter` is set.
    /// Defaults to stdout.
    pub fn console_writer(mut self, out: impl Write + Send + 'static) -> Self {
        self.console = Some(ConsoleExporter::new(out));
        self
    }

    pub fn build(self) -> Result<Telemetry> {
        self.config.validate()?;

        let console = if self.config.enable_console_exporter {
            Some(self.console.unwrap_or_default())
        } else {
            None
        };

        let resource = Resource {
            service_name: self.config.service_name.clone(),
            service_version: self.config.service_version.clone(),
            environment: self.config.environment.clone(),
        };

        debug!(
            service = %resource.service_name,
            environment = %resource.environment,
            sampling_rate = self.config.sampling_rate,
            batch_size = self.config.batch_size,
            "Telemetry buffer initialized"
        );

        Ok(Telemetry {
            inner: Arc::new(Inner {
                sampler: Sampler::new(self.config.sampling_rate),
                resource,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
                store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
                console,
                state: Mutex::new(BufferState::default()),
                timer: Mutex::new(None),
                destroyed: AtomicBool::new(false),
                config: self.config,
            }),
        })
    }
}

impl Telemetry {
    pub fn builder(config: TelemetryConfig) -> TelemetryBuilder {
        TelemetryBuilder {
            config,
            store: None,
            clock: None,
            console: None,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    // ------------------------------------------------------------------
    // Spans
    // ------------------------------------------------------------------

    /// Start a span. Returns the empty id when sampling rejects it.
    ///
    /// The new span becomes the current context, so spans started afterwards
    /// nest under it and logs recorded afterwards carry its ids.
    pub fn start_span(&self, name: impl Into<String>, options: StartSpanOptions) -> SpanId {
        if !self.inner.sampler.should_sample() {
            return SpanId::unsampled();
        }

        let name = name.into();
        let span_id = generate_span_id();
        let start_time = self.inner.clock.monotonic_ms();

        let mut state = self.inner.state();
        let (trace_id, parent_span_id) = match options.parent {
            Some(parent) => (
                parent.trace_id,
                options.parent_span_id.or(Some(parent.span_id)),
            ),
            None => match state.current.as_ref() {
                Some(ctx) => (
                    ctx.trace_id.clone(),
                    options.parent_span_id.or_else(|| Some(ctx.span_id.clone())),
                ),
                None => (generate_trace_id(), options.parent_span_id),
            },
        };

        trace!(span = %name, span_id = %span_id, trace_id = %trace_id, "Span started");

        state.current = Some(TraceContext::new(trace_id.clone(), span_id.clone()));
        state.active.insert(
            span_id.clone(),
            Span::new(
                trace_id,
                span_id.clone(),
                parent_span_id,
                name,
                options.kind,
                options.attributes,
                start_time,
            ),
        );

        SpanId::new(span_id)
    }

    /// End an active span and queue it. Unknown, already ended, or
    /// unsampled ids are ignored.
    pub fn end_span(&self, id: &SpanId, status: SpanStatus) {
        if id.is_empty() {
            return;
        }
        let end_time = self.inner.clock.monotonic_ms();

        let (exported, should_flush) = {
            let mut state = self.inner.state();
            let Some(mut span) = state.active.remove(id.as_str()) else {
                return;
            };
            span.finish(end_time, status);
            trace!(span = %span.name, status = %span.status, "Span ended");

            let exported = self.inner.console.as_ref().map(|_| span.clone());
            state.spans.push(span);
            (exported, state.spans.len() >= self.inner.config.batch_size)
        };

        if let (Some(console), Some(span)) = (self.inner.console.as_ref(), exported) {
            console.export_span(&span);
        }
        if should_flush {
            self.flush();
        }
    }

    /// Append an event to an active span.
    pub fn add_span_event(&self, id: &SpanId, name: impl Into<String>, attributes: Attributes) {
        if id.is_empty() {
            return;
        }
        let timestamp = self.inner.clock.monotonic_ms();
        let mut state = self.inner.state();
        if let Some(span) = state.active.get_mut(id.as_str()) {
            span.add_event(name.into(), timestamp, attributes);
        }
    }

    /// Set (or overwrite) one attribute on an active span.
    pub fn set_span_attribute(
        &self,
        id: &SpanId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) {
        if id.is_empty() {
            return;
        }
        let mut state = self.inner.state();
        if let Some(span) = state.active.get_mut(id.as_str()) {
            span.set_attribute(key.into(), value.into());
        }
    }

    /// Trace context of an active span.
    pub fn span_context(&self, id: &SpanId) -> Option<TraceContext> {
        let state = self.inner.state();
        state
            .active
            .get(id.as_str())
            .map(|span| TraceContext::new(span.trace_id.clone(), span.span_id.clone()))
    }

    pub fn active_span_count(&self) -> usize {
        self.inner.state().active.len()
    }

    // ------------------------------------------------------------------
    // Trace context
    // ------------------------------------------------------------------

    pub fn current_context(&self) -> Option<TraceContext> {
        self.inner.state().current.clone()
    }

    /// Replace the current context, e.g. with one extracted from an
    /// incoming `traceparent`.
    pub fn set_context(&self, context: Option<TraceContext>) {
        self.inner.state().current = context;
    }

    pub fn clear_context(&self) {
        self.set_context(None);
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    pub fn record_counter(&self, name: impl Into<String>, value: f64, labels: Labels) {
        self.record_metric(name.into(), MetricType::Counter, value, labels);
    }

    pub fn record_gauge(&self, name: impl Into<String>, value: f64, labels: Labels) {
        self.record_metric(name.into(), MetricType::Gauge, value, labels);
    }

    pub fn record_histogram(&self, name: impl Into<String>, value: f64, labels: Labels) {
        self.record_metric(name.into(), MetricType::Histogram, value, labels);
    }

    fn record_metric(&self, name: String, metric_type: MetricType, value: f64, labels: Labels) {
        let mut merged = Labels::new();
        merged.insert("service".to_string(), self.inner.resource.service_name.clone());
        merged.insert(
            "environment".to_string(),
            self.inner.resource.environment.clone(),
        );
        merged.extend(labels);

        let metric = Metric {
            name,
            metric_type,
            value,
            labels: merged,
            timestamp: self.inner.clock.now(),
        };

        if let Some(ref console) = self.inner.console {
            console.export_metric(&metric);
        }

        let should_flush = {
            let mut state = self.inner.state();
            state.metrics.push(metric);
            state.metrics.len() >= self.inner.config.batch_size
        };
        if should_flush {
            self.flush();
        }
    }

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Record a log entry correlated with the current context.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, attributes: Attributes) {
        let context = self.current_context();
        self.log_with_context(level, message, attributes, context.as_ref());
    }

    /// Record a log entry correlated with an explicit context.
    pub fn log_with_context(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        attributes: Attributes,
        context: Option<&TraceContext>,
    ) {
        let entry = LogEntry {
            timestamp: self.inner.clock.now(),
            level,
            message: message.into(),
            trace_id: context.map(|ctx| ctx.trace_id.clone()),
            span_id: context.map(|ctx| ctx.span_id.clone()),
            attributes,
        };

        if let Some(ref console) = self.inner.console {
            console.export_log(&entry);
        }

        let should_flush = {
            let mut state = self.inner.state();
            state.logs.push(entry);
            state.logs.len() >= self.inner.config.batch_size
        };
        if should_flush {
            self.flush();
        }
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message, Attributes::new());
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, Attributes::new());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, Attributes::new());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, Attributes::new());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, Attributes::new());
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message, Attributes::new());
    }

    // ------------------------------------------------------------------
    // Flushing and storage
    // ------------------------------------------------------------------

    /// Drain all queues into one payload and persist it.
    ///
    /// Returns the payload, or `None` when nothing was pending (in which
    /// case nothing is written).
    pub fn flush(&self) -> Option<FlushPayload> {
        self.inner.flush()
    }

    pub fn pending_counts(&self) -> PendingCounts {
        let state = self.inner.state();
        PendingCounts {
            spans: state.spans.len(),
            metrics: state.metrics.len(),
            logs: state.logs.len(),
        }
    }

    /// Payloads persisted so far, oldest first. Empty if the store cannot
    /// be read.
    pub fn stored_data(&self) -> Vec<FlushPayload> {
        match self.inner.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read telemetry store: {}", e);
                Vec::new()
            }
        }
    }

    pub fn clear_stored_data(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!("Failed to clear telemetry store: {}", e);
        }
    }

    /// Stop the flush timer and flush what is pending. Safe to call twice.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.stop_timer();
        let dropped = self.active_span_count();
        if dropped > 0 {
            debug!("Dropping {} active spans on destroy", dropped);
        }
        self.flush();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

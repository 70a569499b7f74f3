//! Client-side telemetry buffer.
//!
//! Spans, metrics and log entries are accumulated in memory and periodically
//! flushed, all three together, to a bounded local store:
//!
//! ```text
//! start_span / end_span ─┐
//! record_counter/gauge/… ─┼─► queues ──flush──► FlushPayload ──► PayloadStore (last 100)
//! info / warn / error …  ─┘      ▲                           └─► console sink (opt-in)
//!                                │
//!            batch_size reached, flush timer, hidden/unload, destroy()
//! ```
//!
//! ## Key Features
//!
//! - **Head sampling**: unsampled spans are never created; their empty id is
//!   accepted everywhere as a no-op
//! - **Atomic drain**: queues are swapped out under one lock, I/O happens after
//! - **Best effort**: store and console failures are logged, never raised
//! - **Drop guard**: pending records are flushed when the last handle goes away

pub mod attributes;
pub mod clock;
pub mod config;
pub mod console;
pub mod context;
pub mod ids;
pub mod lifecycle;
pub mod log;
pub mod manager;
pub mod metric;
pub mod payload;
pub mod sampler;
pub mod span;
pub mod store;

pub use attributes::{attributes, labels, AttributeValue, Attributes, Labels};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TelemetryConfig;
pub use console::{ConsoleExporter, SharedBuffer};
pub use context::TraceContext;
pub use ids::SpanId;
pub use lifecycle::LifecycleEvent;
pub use log::{LogEntry, LogLevel};
pub use manager::{PendingCounts, StartSpanOptions, Telemetry, TelemetryBuilder};
pub use metric::{Metric, MetricType};
pub use payload::{FlushPayload, Resource};
pub use span::{Span, SpanEvent, SpanKind, SpanStatus};
pub use store::{FileStore, MemoryStore, PayloadStore, MAX_STORED_FLUSHES, STORAGE_KEY};

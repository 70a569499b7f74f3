//! Ledgerwatch client telemetry library exports

pub mod error;
pub mod instrumentation;
pub mod query;
pub mod telemetry;

pub use error::{Result, StoreError, TelemetryError};
pub use telemetry::{Telemetry, TelemetryBuilder, TelemetryConfig};

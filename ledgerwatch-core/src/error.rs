//! Error types for the telemetry buffer and its local store

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while configuring or constructing a telemetry buffer.
///
/// Producers (`start_span`, `record_counter`, `log`, ...) never see these:
/// store and console failures during a flush are logged and dropped.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A configuration value is out of range
    #[error("Invalid telemetry configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Failed to read a configuration file
    #[error("Failed to read telemetry config from {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file
    #[error("Failed to parse telemetry config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the bounded local payload store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access telemetry store at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted array is corrupted or not in the expected shape
    #[error("Failed to parse telemetry store at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize telemetry payloads")]
    Serialize(#[from] serde_json::Error),

    /// Writing would exceed the configured storage quota
    #[error("Telemetry store quota exceeded: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },
}

pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

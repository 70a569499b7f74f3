//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use ledgerwatch_core::telemetry::{
    MemoryStore, SharedBuffer, Telemetry, TelemetryConfig,
};

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Buffer over an in-memory store the test can inspect directly.
pub fn memory_telemetry(config: TelemetryConfig) -> (Telemetry, Arc<MemoryStore>) {
    init_test_logging();
    let store = Arc::new(MemoryStore::new());
    let telemetry = Telemetry::builder(config)
        .shared_store(store.clone())
        .build()
        .expect("valid test config");
    (telemetry, store)
}

/// Buffer with the console sink writing into a capturable buffer.
pub fn console_telemetry(config: TelemetryConfig) -> (Telemetry, Arc<MemoryStore>, SharedBuffer) {
    init_test_logging();
    let store = Arc::new(MemoryStore::new());
    let console = SharedBuffer::new();
    let telemetry = Telemetry::builder(TelemetryConfig {
        enable_console_exporter: true,
        ..config
    })
    .shared_store(store.clone())
    .console_writer(console.clone())
    .build()
    .expect("valid test config");
    (telemetry, store, console)
}

pub fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

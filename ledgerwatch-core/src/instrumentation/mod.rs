//! Automatic instrumentation hooks.
//!
//! Each hook is enabled by its own config flag:
//!
//! | hook | flag |
//! |---|---|
//! | network (`Telemetry::trace_request`) | `enable_network_tracing` |
//! | performance entries | `enable_performance_metrics` |
//! | clicks and route changes | `enable_user_interaction_tracing` |

pub mod interaction;
pub mod network;
pub mod performance;

pub use interaction::{ClickEvent, InteractionTracker, NavigationEvent, NavigationKind};
pub use network::{HttpResponse, RequestInfo};
pub use performance::{
    CapabilityReport, EntryType, PerformanceEntry, PerformanceMonitor, PerformanceSource,
    StaticPerformanceSource,
};

use crate::telemetry::Telemetry;

/// The set of hooks installed for one buffer.
#[derive(Debug)]
pub struct Instrumentation {
    telemetry: Telemetry,
    performance: Option<PerformanceMonitor>,
    interactions: Option<InteractionTracker>,
}

impl Instrumentation {
    /// Install the hooks enabled in the buffer's config. Performance entry
    /// types are checked against `source` once, here.
    pub fn install(telemetry: &Telemetry, source: &dyn PerformanceSource) -> Self {
        let config = telemetry.config();

        let performance = config
            .enable_performance_metrics
            .then(|| PerformanceMonitor::detect(telemetry.clone(), source));
        let interactions = config
            .enable_user_interaction_tracing
            .then(|| InteractionTracker::new(telemetry.clone()));

        tracing::debug!(
            network = config.enable_network_tracing,
            performance = performance.is_some(),
            interactions = interactions.is_some(),
            "Instrumentation installed"
        );

        Self {
            telemetry: telemetry.clone(),
            performance,
            interactions,
        }
    }

    pub fn network_enabled(&self) -> bool {
        self.telemetry.config().enable_network_tracing
    }

    /// Capability report, `None` when performance metrics are disabled.
    pub fn performance_report(&self) -> Option<&CapabilityReport> {
        self.performance.as_ref().map(PerformanceMonitor::report)
    }

    pub fn on_performance_entry(&self, entry: &PerformanceEntry) -> bool {
        self.performance
            .as_ref()
            .is_some_and(|monitor| monitor.record(entry))
    }

    pub fn on_click(&self, event: &ClickEvent) {
        if let Some(ref tracker) = self.interactions {
            tracker.record_click(event);
        }
    }

    pub fn on_navigation(&self, event: &NavigationEvent) {
        if let Some(ref tracker) = self.interactions {
            tracker.record_navigation(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryConfig;

    #[test]
    fn test_disabled_hooks_record_nothing() {
        let tel = Telemetry::builder(TelemetryConfig {
            enable_performance_metrics: false,
            enable_user_interaction_tracing: false,
            ..Default::default()
        })
        .build()
        .unwrap();
        let hooks = Instrumentation::install(&tel, &StaticPerformanceSource::all());

        assert!(hooks.performance_report().is_none());
        assert!(!hooks.on_performance_entry(&PerformanceEntry::LongTask { duration: 60.0 }));
        hooks.on_click(&ClickEvent::new("button"));

        assert!(tel.flush().is_none());
    }
}

//! Page performance entries mapped to Web Vitals metrics.
//!
//! Support for each entry type is detected once, when the monitor is created.
//! Unsupported types are recorded in the report and their entries are
//! ignored afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::telemetry::{Labels, Telemetry};

/// Performance entry types the monitor knows how to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Paint,
    LargestContentfulPaint,
    FirstInput,
    LayoutShift,
    Longtask,
    Navigation,
}

impl EntryType {
    pub const ALL: [EntryType; 6] = [
        EntryType::Paint,
        EntryType::LargestContentfulPaint,
        EntryType::FirstInput,
        EntryType::LayoutShift,
        EntryType::Longtask,
        EntryType::Navigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Paint => "paint",
            EntryType::LargestContentfulPaint => "largest-contentful-paint",
            EntryType::FirstInput => "first-input",
            EntryType::LayoutShift => "layout-shift",
            EntryType::Longtask => "longtask",
            EntryType::Navigation => "navigation",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed performance entry. Times are milliseconds relative to the
/// page's time origin.
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceEntry {
    /// `first-paint` or `first-contentful-paint`
    Paint { name: String, start_time: f64 },
    LargestContentfulPaint { start_time: f64 },
    FirstInput { start_time: f64, processing_start: f64 },
    LayoutShift { value: f64, had_recent_input: bool },
    LongTask { duration: f64 },
    Navigation {
        request_start: f64,
        response_start: f64,
        dom_content_loaded_event_end: f64,
        load_event_end: f64,
    },
}

impl PerformanceEntry {
    pub fn entry_type(&self) -> EntryType {
        match self {
            PerformanceEntry::Paint { .. } => EntryType::Paint,
            PerformanceEntry::LargestContentfulPaint { .. } => EntryType::LargestContentfulPaint,
            PerformanceEntry::FirstInput { .. } => EntryType::FirstInput,
            PerformanceEntry::LayoutShift { .. } => EntryType::LayoutShift,
            PerformanceEntry::LongTask { .. } => EntryType::Longtask,
            PerformanceEntry::Navigation { .. } => EntryType::Navigation,
        }
    }
}

/// Host capability: which entry types can be observed.
pub trait PerformanceSource {
    fn supports(&self, entry_type: EntryType) -> bool;
}

/// Source that supports a fixed set of entry types.
#[derive(Debug, Clone, Default)]
pub struct StaticPerformanceSource {
    supported: BTreeSet<EntryType>,
}

impl StaticPerformanceSource {
    pub fn all() -> Self {
        Self {
            supported: EntryType::ALL.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(entry_types: impl IntoIterator<Item = EntryType>) -> Self {
        Self {
            supported: entry_types.into_iter().collect(),
        }
    }
}

impl PerformanceSource for StaticPerformanceSource {
    fn supports(&self, entry_type: EntryType) -> bool {
        self.supported.contains(&entry_type)
    }
}

/// Which entry types were registered and which were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub registered: Vec<EntryType>,
    pub unsupported: Vec<EntryType>,
}

/// Records performance entries as gauges and histograms.
#[derive(Debug)]
pub struct PerformanceMonitor {
    telemetry: Telemetry,
    report: CapabilityReport,
    // Running layout-shift sum
    cls: Mutex<f64>,
}

impl PerformanceMonitor {
    pub fn detect(telemetry: Telemetry, source: &dyn PerformanceSource) -> Self {
        let mut report = CapabilityReport::default();
        for entry_type in EntryType::ALL {
            if source.supports(entry_type) {
                report.registered.push(entry_type);
            } else {
                debug!("Performance entry type {} unsupported, skipping", entry_type);
                report.unsupported.push(entry_type);
            }
        }

        Self {
            telemetry,
            report,
            cls: Mutex::new(0.0),
        }
    }

    pub fn report(&self) -> &CapabilityReport {
        &self.report
    }

    pub fn is_registered(&self, entry_type: EntryType) -> bool {
        self.report.registered.contains(&entry_type)
    }

    pub fn cumulative_layout_shift(&self) -> f64 {
        *self.cls.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one entry. Returns `false` when its type is not registered.
    pub fn record(&self, entry: &PerformanceEntry) -> bool {
        if !self.is_registered(entry.entry_type()) {
            return false;
        }

        let tel = &self.telemetry;
        match entry {
            PerformanceEntry::Paint { name, start_time } => match name.as_str() {
                "first-paint" => tel.record_gauge("web_vitals.fp", *start_time, Labels::new()),
                "first-contentful-paint" => {
                    tel.record_gauge("web_vitals.fcp", *start_time, Labels::new())
                }
                _ => return false,
            },
            PerformanceEntry::LargestContentfulPaint { start_time } => {
                tel.record_gauge("web_vitals.lcp", *start_time, Labels::new());
            }
            PerformanceEntry::FirstInput {
                start_time,
                processing_start,
            } => {
                let delay = (processing_start - start_time).max(0.0);
                tel.record_gauge("web_vitals.fid", delay, Labels::new());
            }
            PerformanceEntry::LayoutShift {
                value,
                had_recent_input,
            } => {
                // Shifts right after user input are expected, not counted
                if *had_recent_input {
                    return true;
                }
                let total = {
                    let mut cls = self.cls.lock().unwrap_or_else(|e| e.into_inner());
                    *cls += value;
                    *cls
                };
                tel.record_gauge("web_vitals.cls", total, Labels::new());
            }
            PerformanceEntry::LongTask { duration } => {
                tel.record_histogram("performance.long_task", *duration, Labels::new());
            }
            PerformanceEntry::Navigation {
                request_start,
                response_start,
                dom_content_loaded_event_end,
                load_event_end,
            } => {
                tel.record_gauge(
                    "navigation.ttfb",
                    (response_start - request_start).max(0.0),
                    Labels::new(),
                );
                tel.record_gauge(
                    "navigation.dom_content_loaded",
                    *dom_content_loaded_event_end,
                    Labels::new(),
                );
                tel.record_gauge("navigation.load_complete", *load_event_end, Labels::new());
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{MetricType, TelemetryConfig};

    fn telemetry() -> Telemetry {
        Telemetry::builder(TelemetryConfig::default()).build().unwrap()
    }

    #[test]
    fn test_detect_splits_supported() {
        let source = StaticPerformanceSource::with([EntryType::Paint, EntryType::Navigation]);
        let monitor = PerformanceMonitor::detect(telemetry(), &source);

        assert_eq!(
            monitor.report().registered,
            vec![EntryType::Paint, EntryType::Navigation]
        );
        assert_eq!(monitor.report().unsupported.len(), 4);
        assert!(!monitor.record(&PerformanceEntry::LongTask { duration: 120.0 }));
    }

    #[test]
    fn test_layout_shift_accumulates() {
        let tel = telemetry();
        let monitor = PerformanceMonitor::detect(tel.clone(), &StaticPerformanceSource::all());

        monitor.record(&PerformanceEntry::LayoutShift {
            value: 0.01,
            had_recent_input: false,
        });
        monitor.record(&PerformanceEntry::LayoutShift {
            value: 0.5,
            had_recent_input: true,
        });
        monitor.record(&PerformanceEntry::LayoutShift {
            value: 0.02,
            had_recent_input: false,
        });

        assert!((monitor.cumulative_layout_shift() - 0.03).abs() < 1e-9);
        let payload = tel.flush().unwrap();
        assert_eq!(payload.metrics.len(), 2);
        assert!((payload.metrics[1].value - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_entry_mapping() {
        let tel = telemetry();
        let monitor = PerformanceMonitor::detect(tel.clone(), &StaticPerformanceSource::all());

        monitor.record(&PerformanceEntry::Paint {
            name: "first-contentful-paint".into(),
            start_time: 812.0,
        });
        monitor.record(&PerformanceEntry::FirstInput {
            start_time: 1000.0,
            processing_start: 1016.0,
        });
        monitor.record(&PerformanceEntry::LongTask { duration: 87.0 });
        monitor.record(&PerformanceEntry::Navigation {
            request_start: 10.0,
            response_start: 130.0,
            dom_content_loaded_event_end: 900.0,
            load_event_end: 1400.0,
        });

        let payload = tel.flush().unwrap();
        let names: Vec<_> = payload.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "web_vitals.fcp",
                "web_vitals.fid",
                "performance.long_task",
                "navigation.ttfb",
                "navigation.dom_content_loaded",
                "navigation.load_complete",
            ]
        );
        assert_eq!(payload.metrics[1].value, 16.0);
        assert_eq!(payload.metrics[2].metric_type, MetricType::Histogram);
        assert_eq!(payload.metrics[3].value, 120.0);
    }
}

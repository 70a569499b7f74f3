//! Simulated browser session driven through the telemetry buffer.
//!
//! Useful for seeding a store to look at with `inspect`, `logs` and `spans`.

use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use ledgerwatch_core::instrumentation::{
    ClickEvent, Instrumentation, NavigationEvent, NavigationKind, PerformanceEntry, RequestInfo,
    StaticPerformanceSource,
};
use ledgerwatch_core::telemetry::{
    attributes, labels, LifecycleEvent, SpanStatus, StartSpanOptions, Telemetry,
};

const ENDPOINTS: [&str; 5] = [
    "/rest/v1/balance_sheets",
    "/rest/v1/income_statements",
    "/rest/v1/cash_flow_statements",
    "/rest/v1/financial_ratios",
    "/rest/v1/audit_logs",
];

/// Fake network call. Every seventh request fails outright and every fifth
/// comes back with a server error.
async fn simulated_fetch(n: usize) -> Result<u16> {
    tokio::time::sleep(Duration::from_millis(5 + (n as u64 * 7) % 40)).await;
    if n % 7 == 6 {
        return Err(anyhow!("connection reset by peer"));
    }
    Ok(if n % 5 == 4 { 500 } else { 200 })
}

pub async fn run(telemetry: &Telemetry, requests: usize) -> Result<()> {
    telemetry.start_flush_timer();
    let hooks = Instrumentation::install(telemetry, &StaticPerformanceSource::all());

    // Initial page load
    hooks.on_performance_entry(&PerformanceEntry::Navigation {
        request_start: 12.0,
        response_start: 148.0,
        dom_content_loaded_event_end: 730.0,
        load_event_end: 1_210.0,
    });
    hooks.on_performance_entry(&PerformanceEntry::Paint {
        name: "first-paint".into(),
        start_time: 410.0,
    });
    hooks.on_performance_entry(&PerformanceEntry::Paint {
        name: "first-contentful-paint".into(),
        start_time: 455.0,
    });
    hooks.on_performance_entry(&PerformanceEntry::LargestContentfulPaint { start_time: 1_380.0 });
    telemetry.info("Dashboard loaded");

    let session = telemetry.start_span(
        "load_financial_statements",
        StartSpanOptions::new().with_attribute("company.id", 1042i64),
    );

    for n in 0..requests {
        let url = ENDPOINTS[n % ENDPOINTS.len()];
        let result = telemetry
            .trace_request(RequestInfo::get(url), simulated_fetch(n))
            .await;
        match result {
            Ok(status) => debug!("GET {} -> {}", url, status),
            Err(e) => debug!("GET {} failed: {}", url, e),
        }

        if n % 3 == 2 {
            hooks.on_performance_entry(&PerformanceEntry::LongTask {
                duration: 50.0 + n as f64,
            });
        }
    }

    telemetry.add_span_event(
        &session,
        "statements_rendered",
        attributes([("requests", requests as i64)]),
    );
    telemetry.end_span(&session, SpanStatus::Ok);

    // Ratio analysis: a user-driven flow with a layout shift and a warning
    hooks.on_click(&ClickEvent::new("button").with_id("calculate-ratios"));
    hooks.on_navigation(&NavigationEvent {
        kind: NavigationKind::Push,
        from: "/dashboard".into(),
        to: "/ratios".into(),
    });
    hooks.on_performance_entry(&PerformanceEntry::LayoutShift {
        value: 0.04,
        had_recent_input: false,
    });

    let analysis = telemetry.start_span("calculate_ratios", StartSpanOptions::new());
    telemetry.set_span_attribute(&analysis, "ratios.count", 14i64);
    telemetry.warn("Quick ratio below 1.0 for FY2023");
    telemetry.record_gauge("ratios.current_ratio", 1.8, labels([("fiscal_year", "2023")]));
    telemetry.end_span(&analysis, SpanStatus::Ok);

    hooks.on_performance_entry(&PerformanceEntry::FirstInput {
        start_time: 2_010.0,
        processing_start: 2_024.0,
    });
    hooks.on_click(&ClickEvent::new("a"));
    hooks.on_navigation(&NavigationEvent {
        kind: NavigationKind::Pop,
        from: "/ratios".into(),
        to: "/dashboard".into(),
    });

    telemetry.handle_lifecycle_event(LifecycleEvent::VisibilityHidden);
    telemetry.info("Session ended");
    telemetry.destroy();

    info!("Demo session finished ({} requests)", requests);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerwatch_core::telemetry::{MemoryStore, TelemetryConfig};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_demo_persists_session() {
        let store = Arc::new(MemoryStore::new());
        let telemetry = Telemetry::builder(TelemetryConfig::default())
            .shared_store(store.clone())
            .build()
            .unwrap();

        run(&telemetry, 10).await.unwrap();

        assert!(telemetry.is_destroyed());
        // Hidden flush, then the final destroy flush
        assert_eq!(store.len(), 2);
        let spans: usize = telemetry.stored_data().iter().map(|p| p.spans.len()).sum();
        // 10 requests, the session, the analysis and two navigations
        assert_eq!(spans, 14);
    }
}

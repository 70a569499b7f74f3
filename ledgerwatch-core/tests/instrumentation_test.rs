//! Instrumentation hooks feeding a real buffer, read back through the query API.

mod common;

use ledgerwatch_core::instrumentation::{
    ClickEvent, EntryType, Instrumentation, NavigationEvent, NavigationKind, PerformanceEntry,
    RequestInfo, StaticPerformanceSource,
};
use ledgerwatch_core::query::{paginate, summarize, LogQuery, SpanQuery, StoreQuery};
use ledgerwatch_core::telemetry::{LogLevel, SpanStatus, StartSpanOptions, TelemetryConfig};
use pretty_assertions::assert_eq;

use common::memory_telemetry;

#[tokio::test]
async fn test_session_round_trip() {
    let (tel, _) = memory_telemetry(TelemetryConfig::default());
    let source = StaticPerformanceSource::with([EntryType::Paint, EntryType::Longtask]);
    let hooks = Instrumentation::install(&tel, &source);

    let report = hooks.performance_report().unwrap();
    assert_eq!(report.registered, vec![EntryType::Paint, EntryType::Longtask]);
    assert!(report.unsupported.contains(&EntryType::LayoutShift));
    assert!(hooks.network_enabled());

    assert!(hooks.on_performance_entry(&PerformanceEntry::Paint {
        name: "first-paint".into(),
        start_time: 320.0,
    }));
    assert!(!hooks.on_performance_entry(&PerformanceEntry::LayoutShift {
        value: 0.2,
        had_recent_input: false,
    }));

    let page = tel.start_span("load_dashboard", StartSpanOptions::new());
    let _ = tel
        .trace_request(RequestInfo::get("/rest/v1/balance_sheets"), async {
            Ok::<_, String>(200u16)
        })
        .await;
    let _ = tel
        .trace_request(RequestInfo::post("/rest/v1/journal_entries"), async {
            Err::<u16, _>("timeout".to_string())
        })
        .await;
    tel.end_span(&page, SpanStatus::Ok);
    tel.clear_context();

    hooks.on_click(&ClickEvent::new("button").with_id("export-pdf"));
    hooks.on_navigation(&NavigationEvent {
        kind: NavigationKind::Replace,
        from: "/dashboard".into(),
        to: "/reports".into(),
    });
    tel.destroy();

    let stored = tel.stored_data();
    let summary = summarize(&stored);
    assert_eq!(summary.flushes, 1);
    assert_eq!(summary.spans, 4);
    assert_eq!(summary.errored_spans, 1);
    assert_eq!(summary.logs_by_level.get(&LogLevel::Error), Some(&1));

    let query = StoreQuery::new(&stored);
    let failed = query.spans(&SpanQuery {
        status: Some(SpanStatus::Error),
        ..Default::default()
    });
    assert_eq!(failed[0].name, "HTTP POST");

    // Requests ran under the page span, so they share its trace
    let (trace_spans, trace_logs) = query.trace(&failed[0].trace_id);
    assert_eq!(trace_spans.len(), 3);
    assert_eq!(trace_logs.len(), 1);
    let get = stored[0]
        .spans
        .iter()
        .find(|s| s.name == "HTTP GET")
        .unwrap();
    assert_eq!(get.parent_span_id.as_deref(), Some(page.as_str()));

    let errors = query.logs(&LogQuery {
        min_level: Some(LogLevel::Error),
        ..Default::default()
    });
    assert_eq!(
        errors[0].message,
        "HTTP request failed: POST /rest/v1/journal_entries"
    );

    let metric_names: Vec<_> = stored[0].metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        metric_names,
        vec![
            "web_vitals.fp",
            "http.client.duration",
            "http.client.duration",
            "user_interaction.click",
            "navigation.route_change",
        ]
    );

    let first_page = paginate(query.spans(&SpanQuery::default()), 1, 3);
    assert_eq!(first_page.items.len(), 3);
    assert_eq!(first_page.total_pages, 2);
}

#[test]
fn test_interaction_tracing_disabled() {
    let (tel, _) = memory_telemetry(TelemetryConfig {
        enable_user_interaction_tracing: false,
        ..Default::default()
    });
    let hooks = Instrumentation::install(&tel, &StaticPerformanceSource::none());

    hooks.on_click(&ClickEvent::new("a"));
    hooks.on_navigation(&NavigationEvent {
        kind: NavigationKind::Pop,
        from: "/a".into(),
        to: "/b".into(),
    });

    assert!(tel.pending_counts().is_empty());
    assert_eq!(hooks.performance_report().unwrap().registered.len(), 0);
}

//! User interaction tracing: clicks and client-side route changes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::telemetry::{
    attributes, labels, SpanKind, SpanStatus, StartSpanOptions, Telemetry,
};

pub const CLICK_METRIC: &str = "user_interaction.click";
pub const ROUTE_CHANGE_METRIC: &str = "navigation.route_change";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    /// Lower-case element tag, e.g. `button`
    pub tag: String,
    pub id: Option<String>,
}

impl ClickEvent {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// How the route changed: history push, history replace, or back/forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

impl fmt::Display for NavigationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NavigationKind::Push => "push",
            NavigationKind::Replace => "replace",
            NavigationKind::Pop => "pop",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub kind: NavigationKind,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct InteractionTracker {
    telemetry: Telemetry,
}

impl InteractionTracker {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }

    pub fn record_click(&self, event: &ClickEvent) {
        let mut click_labels = labels([("element", event.tag.clone())]);
        if let Some(ref id) = event.id {
            click_labels.insert("element_id".to_string(), id.clone());
        }
        self.telemetry.record_counter(CLICK_METRIC, 1.0, click_labels);
    }

    /// A route change is an instantaneous internal span plus a counter.
    pub fn record_navigation(&self, event: &NavigationEvent) {
        let span = self.telemetry.start_span(
            format!("navigation.{}", event.kind),
            StartSpanOptions::new()
                .with_kind(SpanKind::Internal)
                .with_attributes(attributes([
                    ("navigation.from", event.from.as_str()),
                    ("navigation.to", event.to.as_str()),
                ])),
        );
        self.telemetry.end_span(&span, SpanStatus::Ok);
        self.telemetry.record_counter(
            ROUTE_CHANGE_METRIC,
            1.0,
            labels([("kind", event.kind.to_string())]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryConfig;

    #[test]
    fn test_click_labels() {
        let tel = Telemetry::builder(TelemetryConfig::default()).build().unwrap();
        let tracker = InteractionTracker::new(tel.clone());

        tracker.record_click(&ClickEvent::new("BUTTON").with_id("save-balance-sheet"));
        tracker.record_click(&ClickEvent::new("a"));

        let payload = tel.flush().unwrap();
        assert_eq!(payload.metrics[0].name, CLICK_METRIC);
        assert_eq!(payload.metrics[0].labels["element"], "button");
        assert_eq!(payload.metrics[0].labels["element_id"], "save-balance-sheet");
        assert!(!payload.metrics[1].labels.contains_key("element_id"));
    }

    #[test]
    fn test_navigation_span_and_counter() {
        let tel = Telemetry::builder(TelemetryConfig::default()).build().unwrap();
        let tracker = InteractionTracker::new(tel.clone());

        tracker.record_navigation(&NavigationEvent {
            kind: NavigationKind::Push,
            from: "/balance-sheet".into(),
            to: "/ratios".into(),
        });

        let payload = tel.flush().unwrap();
        let span = &payload.spans[0];
        assert_eq!(span.name, "navigation.push");
        assert_eq!(span.status, SpanStatus::Ok);
        assert_eq!(span.attributes["navigation.to"].as_str(), Some("/ratios"));
        assert_eq!(payload.metrics[0].name, ROUTE_CHANGE_METRIC);
        assert_eq!(payload.metrics[0].labels["kind"], "push");
    }
}

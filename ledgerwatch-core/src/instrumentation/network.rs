//! Network call instrumentation.
//!
//! Wraps any fetch-like future in a client span. The span starts before the
//! await and ends in the success or failure continuation; errors are
//! recorded and then returned to the caller unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use crate::telemetry::{
    attributes, labels, LogLevel, SpanKind, SpanStatus, StartSpanOptions, Telemetry,
};

pub const REQUEST_DURATION_METRIC: &str = "http.client.duration";

/// What the instrumentation needs to know about an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }
}

/// A response that exposes an HTTP status code.
pub trait HttpResponse {
    fn status_code(&self) -> u16;

    fn is_success(&self) -> bool {
        self.status_code() < 400
    }
}

impl HttpResponse for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

impl<T> HttpResponse for (u16, T) {
    fn status_code(&self) -> u16 {
        self.0
    }
}

impl Telemetry {
    /// Run `request` inside a client span.
    ///
    /// On success the span carries `http.status_code` and ends `ok` for
    /// statuses below 400, `error` otherwise. On failure the span ends
    /// `error`, an error log is recorded, and the original error is
    /// returned. Every outcome records the `http.client.duration` histogram.
    ///
    /// With network tracing disabled the future is awaited untouched.
    pub async fn trace_request<F, R, E>(&self, info: RequestInfo, request: F) -> Result<R, E>
    where
        F: Future<Output = Result<R, E>>,
        R: HttpResponse,
        E: Display,
    {
        if !self.config().enable_network_tracing {
            return request.await;
        }

        let span = self.start_span(
            format!("HTTP {}", info.method),
            StartSpanOptions::new()
                .with_kind(SpanKind::Client)
                .with_attributes(attributes([
                    ("http.method", info.method.as_str()),
                    ("http.url", info.url.as_str()),
                ])),
        );
        let context = self.span_context(&span);
        let started = Instant::now();

        let result = request.await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(response) => {
                let status = response.status_code();
                self.set_span_attribute(&span, "http.status_code", status);
                let span_status = if response.is_success() {
                    SpanStatus::Ok
                } else {
                    SpanStatus::Error
                };
                self.end_span(&span, span_status);
                self.record_histogram(
                    REQUEST_DURATION_METRIC,
                    duration_ms,
                    labels([
                        ("method", info.method.clone()),
                        ("status", status.to_string()),
                    ]),
                );
            }
            Err(error) => {
                let message = error.to_string();
                self.set_span_attribute(&span, "error.message", message.as_str());
                self.end_span(&span, SpanStatus::Error);
                self.log_with_context(
                    LogLevel::Error,
                    format!("HTTP request failed: {} {}", info.method, info.url),
                    attributes([("error.message", message)]),
                    context.as_ref(),
                );
                self.record_histogram(
                    REQUEST_DURATION_METRIC,
                    duration_ms,
                    labels([
                        ("method", info.method.clone()),
                        ("status", "error".to_string()),
                    ]),
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryConfig;

    #[test]
    fn test_request_info_normalizes_method() {
        let info = RequestInfo::new("post", "/rest/v1/balance_sheets");
        assert_eq!(info.method, "POST");
        assert_eq!(RequestInfo::get("/x").method, "GET");
    }

    #[test]
    fn test_status_helpers() {
        assert!(200u16.is_success());
        assert!(302u16.is_success());
        assert!(!(404u16).is_success());
        assert_eq!((201u16, "body").status_code(), 201);
    }

    #[tokio::test]
    async fn test_success_records_span_and_histogram() {
        let tel = Telemetry::builder(TelemetryConfig::default()).build().unwrap();

        let response = tel
            .trace_request(RequestInfo::get("/rest/v1/income_statements"), async {
                Ok::<_, String>((200u16, "rows"))
            })
            .await
            .unwrap();
        assert_eq!(response.1, "rows");

        let payload = tel.flush().unwrap();
        assert_eq!(payload.spans.len(), 1);
        let span = &payload.spans[0];
        assert_eq!(span.name, "HTTP GET");
        assert_eq!(span.kind, SpanKind::Client);
        assert_eq!(span.status, SpanStatus::Ok);
        assert_eq!(span.attributes["http.status_code"].as_i64(), Some(200));

        let metric = &payload.metrics[0];
        assert_eq!(metric.name, REQUEST_DURATION_METRIC);
        assert_eq!(metric.labels["status"], "200");
        assert!(payload.logs.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_returned_unchanged() {
        let tel = Telemetry::builder(TelemetryConfig::default()).build().unwrap();

        let err = tel
            .trace_request(RequestInfo::post("/rest/v1/cash_flows"), async {
                Err::<u16, _>("connection reset".to_string())
            })
            .await
            .unwrap_err();
        assert_eq!(err, "connection reset");

        let payload = tel.flush().unwrap();
        let span = &payload.spans[0];
        assert_eq!(span.status, SpanStatus::Error);
        assert_eq!(
            span.attributes["error.message"].as_str(),
            Some("connection reset")
        );

        let log = &payload.logs[0];
        assert_eq!(log.level, LogLevel::Error);
        assert_eq!(log.message, "HTTP request failed: POST /rest/v1/cash_flows");
        assert_eq!(log.span_id.as_deref(), Some(span.span_id.as_str()));
        assert_eq!(payload.metrics[0].labels["status"], "error");
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let tel = Telemetry::builder(TelemetryConfig {
            enable_network_tracing: false,
            ..Default::default()
        })
        .build()
        .unwrap();

        let status = tel
            .trace_request(RequestInfo::get("/x"), async { Ok::<_, String>(500u16) })
            .await
            .unwrap();
        assert_eq!(status, 500);
        assert!(tel.flush().is_none());
    }
}

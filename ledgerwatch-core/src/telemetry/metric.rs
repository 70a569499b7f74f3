//! Metric samples. Created and queued in one step, never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::attributes::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,

    #[serde(rename = "type")]
    pub metric_type: MetricType,

    pub value: f64,

    #[serde(default)]
    pub labels: Labels,

    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::attributes::labels;

    #[test]
    fn test_type_field_name() {
        let metric = Metric {
            name: "web_vitals.cls".into(),
            metric_type: MetricType::Gauge,
            value: 0.02,
            labels: labels([("environment", "test")]),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["type"], "gauge");
        assert_eq!(json["value"], 0.02);
        assert_eq!(json["labels"]["environment"], "test");
    }
}

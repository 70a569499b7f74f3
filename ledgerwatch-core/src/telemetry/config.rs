//! Telemetry buffer configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. `LEDGERWATCH_*` environment variables
//! 2. A config file (`.yml`/`.yaml` or `.json`)
//! 3. Built-in defaults
//!
//! ```yaml
//! service_name: ledgerwatch-web
//! environment: production
//! sampling_rate: 0.25
//! enable_console_exporter: false
//! batch_size: 50
//! flush_interval_ms: 10000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TelemetryError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_service_version")]
    pub service_version: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Probability (0..=1) that a started span is recorded
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,

    /// Mirror spans, metrics, logs and flush summaries to the console sink
    #[serde(default)]
    pub enable_console_exporter: bool,

    #[serde(default = "default_true")]
    pub enable_performance_metrics: bool,

    #[serde(default = "default_true")]
    pub enable_user_interaction_tracing: bool,

    #[serde(default = "default_true")]
    pub enable_network_tracing: bool,

    /// Queue length that triggers an eager flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Period of the background flush timer
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_version: default_service_version(),
            environment: default_environment(),
            sampling_rate: default_sampling_rate(),
            enable_console_exporter: false,
            enable_performance_metrics: true,
            enable_user_interaction_tracing: true,
            enable_network_tracing: true,
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

fn default_service_name() -> String {
    "ledgerwatch-web".to_string()
}

fn default_service_version() -> String {
    "1.0.0".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_sampling_rate() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    50
}

fn default_flush_interval_ms() -> u64 {
    10_000
}

impl TelemetryConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Check ranges. Called by the buffer builder before construction.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(TelemetryError::InvalidConfig {
                field: "sampling_rate",
                reason: format!("must be between 0 and 1, got {}", self.sampling_rate),
            });
        }
        if self.batch_size == 0 {
            return Err(TelemetryError::InvalidConfig {
                field: "batch_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.flush_interval_ms == 0 {
            return Err(TelemetryError::InvalidConfig {
                field: "flush_interval_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.service_name.trim().is_empty() {
            return Err(TelemetryError::InvalidConfig {
                field: "service_name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Load from a YAML or JSON file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| TelemetryError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml_ng::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| TelemetryError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Load from `path` when given and present, falling back to defaults.
    ///
    /// A missing file is not an error; an unreadable or malformed one is
    /// logged and replaced by defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("No telemetry config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using default telemetry config", e);
                Self::default()
            }
        }
    }

    /// Apply `LEDGERWATCH_*` environment variables on top of this config.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(v) = env_string("LEDGERWATCH_SERVICE_NAME") {
            self.service_name = v;
        }
        if let Some(v) = env_string("LEDGERWATCH_SERVICE_VERSION") {
            self.service_version = v;
        }
        if let Some(v) = env_string("LEDGERWATCH_ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = env_parsed("LEDGERWATCH_SAMPLING_RATE") {
            self.sampling_rate = v;
        }
        if let Some(v) = env_parsed("LEDGERWATCH_BATCH_SIZE") {
            self.batch_size = v;
        }
        if let Some(v) = env_parsed("LEDGERWATCH_FLUSH_INTERVAL_MS") {
            self.flush_interval_ms = v;
        }
        if let Some(v) = env_parsed("LEDGERWATCH_CONSOLE_EXPORTER") {
            self.enable_console_exporter = v;
        }
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "ledgerwatch-web");
        assert_eq!(config.sampling_rate, 1.0);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert!(!config.enable_console_exporter);
        assert!(config.enable_network_tracing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: TelemetryConfig =
            serde_yaml_ng::from_str("environment: production\nsampling_rate: 0.25\n").unwrap();
        assert_eq!(config.environment, "production");
        assert_eq!(config.sampling_rate, 0.25);
        assert_eq!(config.batch_size, 50);
        assert!(config.enable_performance_metrics);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = TelemetryConfig {
            sampling_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::InvalidConfig {
                field: "sampling_rate",
                ..
            })
        ));

        let config = TelemetryConfig {
            sampling_rate: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TelemetryConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TelemetryConfig {
            flush_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = TelemetryConfig::load_or_default(Some(Path::new("/nonexistent/telemetry.yml")));
        assert_eq!(config, TelemetryConfig::default());
    }
}

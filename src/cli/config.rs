// Server Configuration Module
// Handles configuration from YAML files and turns it into validated
// simulation settings.

use crate::dispatch::SimulationConfig;
use crate::errors::ErrorPolicy;
use crate::latency::LatencyRange;
use crate::responses::{Override, OverrideTable};
use crate::value::normalize_yaml;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub error_response: ErrorResponseConfig,
    /// Response overrides keyed by request path
    #[serde(default)]
    pub responses: HashMap<String, serde_yaml::Value>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration and normalize every body it carries
    pub fn simulation(&self) -> Result<SimulationConfig, ConfigError> {
        Ok(SimulationConfig {
            latency: self.latency_range()?,
            error_policy: self.error_policy()?,
            overrides: self.overrides()?,
        })
    }

    /// Create a latency range from the configuration
    pub fn latency_range(&self) -> Result<LatencyRange, ConfigError> {
        let range = LatencyRange::new(self.latency.low, self.latency.high);
        if !range.is_valid() {
            return Err(ConfigError::Validation(format!(
                "latency.low ({}) and latency.high ({}) must be finite, non-negative and low <= high",
                self.latency.low, self.latency.high
            )));
        }
        Ok(range)
    }

    /// Create the simulated error policy from the configuration
    pub fn error_policy(&self) -> Result<ErrorPolicy, ConfigError> {
        let cfg = &self.error_response;

        if !(100..=999).contains(&cfg.code) {
            return Err(ConfigError::Validation(format!(
                "error_response.code ({}) is not a valid HTTP status",
                cfg.code
            )));
        }
        if !(0.0..=1.0).contains(&cfg.frequency) {
            return Err(ConfigError::Validation(format!(
                "error_response.frequency ({}) must be between 0.0 and 1.0",
                cfg.frequency
            )));
        }

        let body = normalize_yaml(cfg.body.clone())
            .map_err(|e| ConfigError::Validation(format!("error_response.body: {}", e)))?;

        Ok(ErrorPolicy::new(cfg.code, body, cfg.frequency))
    }

    /// Create the override table from the configuration. String entries stay
    /// raw text; every other entry is normalized now.
    pub fn overrides(&self) -> Result<OverrideTable, ConfigError> {
        let mut table = OverrideTable::new();
        for (path, body) in &self.responses {
            let entry = match body {
                serde_yaml::Value::String(text) => Override::Raw(text.clone()),
                other => Override::Structured(normalize_yaml(other.clone()).map_err(|e| {
                    ConfigError::Validation(format!("responses.{}: {}", path, e))
                })?),
            };
            table.insert(path, entry);
        }
        Ok(table)
    }
}

/// Server network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Latency simulation configuration (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LatencyConfig {
    /// Shortest simulated delay
    #[serde(default)]
    pub low: f64,
    /// Longest simulated delay
    #[serde(default)]
    pub high: f64,
}

/// Simulated error configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponseConfig {
    /// HTTP status code of a simulated error
    #[serde(default = "default_error_code")]
    pub code: u16,
    /// Body of a simulated error
    #[serde(default = "default_error_body")]
    pub body: serde_yaml::Value,
    /// Target proportion of requests that fail (0.0-1.0)
    #[serde(default)]
    pub frequency: f64,
}

fn default_error_code() -> u16 {
    500
}

fn default_error_body() -> serde_yaml::Value {
    let mut body = serde_yaml::Mapping::new();
    body.insert("error".into(), "Simulated error".into());
    serde_yaml::Value::Mapping(body)
}

impl Default for ErrorResponseConfig {
    fn default() -> Self {
        Self {
            code: default_error_code(),
            body: default_error_body(),
            frequency: 0.0,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(String),
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.error_response.code, 500);

        let sim = config.simulation().unwrap();
        assert_eq!(sim.latency, LatencyRange::instant());
        assert_eq!(sim.error_policy.target_frequency, 0.0);
        assert_eq!(sim.error_policy.body, json!({"error": "Simulated error"}));
        assert!(sim.overrides.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
server:
  port: 9000
  host: "127.0.0.1"

latency:
  low: 10
  high: 50

error_response:
  code: 503
  body:
    error: "Service unavailable"
    retry: true
  frequency: 0.25

responses:
  /v1/users: '{"users": []}'
  /v1/items/:
    items: [1, 2, 3]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");

        let sim = config.simulation().unwrap();
        assert_eq!(sim.latency, LatencyRange::new(10.0, 50.0));
        assert_eq!(sim.error_policy.status_code, 503);
        assert_eq!(sim.error_policy.target_frequency, 0.25);
        assert_eq!(
            sim.error_policy.body,
            json!({"error": "Service unavailable", "retry": true})
        );
        assert_eq!(
            sim.overrides.get("/v1/users"),
            Some(&Override::Raw(r#"{"users": []}"#.to_string()))
        );
        assert_eq!(
            sim.overrides.get("/v1/items"),
            Some(&Override::Structured(json!({"items": [1, 2, 3]})))
        );
    }

    #[test]
    fn test_non_string_keys_in_overrides() {
        let yaml = r#"
responses:
  /v1/codes:
    200: ok
    404: missing
"#;
        let sim = Config::from_yaml(yaml).unwrap().simulation().unwrap();
        assert_eq!(
            sim.overrides.get("/v1/codes"),
            Some(&Override::Structured(json!({"200": "ok", "404": "missing"})))
        );
    }

    #[test]
    fn test_invalid_latency() {
        let config = Config::from_yaml("latency: {low: 50, high: 10}").unwrap();
        assert!(matches!(config.simulation(), Err(ConfigError::Validation(_))));

        let config = Config::from_yaml("latency: {low: -5, high: 10}").unwrap();
        assert!(matches!(config.simulation(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_frequency() {
        let config = Config::from_yaml("error_response: {frequency: 1.5}").unwrap();
        let err = config.simulation().unwrap_err();
        assert!(err.to_string().contains("error_response.frequency"));
    }

    #[test]
    fn test_invalid_status_code() {
        let config = Config::from_yaml("error_response: {code: 42}").unwrap();
        let err = config.simulation().unwrap_err();
        assert!(err.to_string().contains("error_response.code"));
    }

    #[test]
    fn test_non_finite_body_rejected() {
        let config = Config::from_yaml("error_response: {body: {ratio: .nan}}").unwrap();
        assert!(matches!(config.simulation(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_yaml("latency: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/apisim.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Instrument catalog JSON document.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    /// Directory for persisted state documents.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Broker order endpoint.
    #[serde(default = "default_order_url")]
    pub order_url: String,
    /// Intake HTTP bind address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Notional capital per paper entry.
    #[serde(default = "default_capital")]
    pub capital: u64,
    /// Fixed cost charged on every live exit.
    #[serde(default = "default_exit_cost")]
    pub exit_cost: u64,
    /// Event bus capacity.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
    /// Persistence tick interval (ms). Writes themselves are further
    /// debounced per document.
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,
}

fn default_catalog_path() -> String {
    "config/instruments.json".to_string()
}

fn default_data_dir() -> String {
    "./data/state".to_string()
}

fn default_order_url() -> String {
    "http://127.0.0.1:8000/orders".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_capital() -> u64 {
    100_000
}

fn default_exit_cost() -> u64 {
    50
}

fn default_bus_capacity() -> usize {
    1_024
}

fn default_persist_interval_ms() -> u64 {
    250
}

impl AppConfig {
    /// Load configuration: explicit path, `TRADEGATE_CONFIG`, or defaults.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let config_path = path
            .map(str::to_string)
            .or_else(|| std::env::var("TRADEGATE_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            data_dir: default_data_dir(),
            order_url: default_order_url(),
            bind_addr: default_bind_addr(),
            capital: default_capital(),
            exit_cost: default_exit_cost(),
            bus_capacity: default_bus_capacity(),
            persist_interval_ms: default_persist_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.capital, 100_000);
        assert_eq!(config.exit_cost, 50);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(r#"capital = 250000"#).unwrap();
        assert_eq!(config.capital, 250_000);
        assert_eq!(config.exit_cost, 50);
        assert_eq!(config.data_dir, "./data/state");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("capital"));
        assert!(toml_str.contains("order_url"));
    }
}

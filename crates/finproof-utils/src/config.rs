//! Application configuration

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Settings shared by the finproof front ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for persistent state
    pub data_dir: PathBuf,

    /// Job store file; `None` means `jobs.json` under `data_dir`
    pub store_path: Option<PathBuf>,

    /// History requested from the data provider
    pub data_period: String,

    /// Jobs executed per batch run
    pub default_batch_size: usize,

    /// Parallel jobs when running concurrently
    pub concurrency: usize,

    /// Completed jobs kept by cleanup
    pub retention_completed: usize,

    /// Failed and cancelled jobs kept by cleanup
    pub retention_failed: usize,

    /// Per-analyzer deadline in seconds
    pub analyzer_timeout_secs: Option<u64>,

    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".finproof"),
            store_path: None,
            data_period: "1y".to_string(),
            default_batch_size: 10,
            concurrency: 4,
            retention_completed: 20,
            retention_failed: 10,
            analyzer_timeout_secs: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Create a new configuration builder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Defaults overridden by `FINPROOF_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read a JSON config file; missing keys take defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("FINPROOF_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("FINPROOF_STORE_PATH") {
            config.store_path = Some(PathBuf::from(path));
        }
        if let Some(period) = lookup("FINPROOF_DATA_PERIOD") {
            config.data_period = period;
        }
        if let Some(v) = lookup("FINPROOF_BATCH_SIZE") {
            config.default_batch_size = parse_env("FINPROOF_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("FINPROOF_CONCURRENCY") {
            config.concurrency = parse_env("FINPROOF_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("FINPROOF_KEEP_COMPLETED") {
            config.retention_completed = parse_env("FINPROOF_KEEP_COMPLETED", &v)?;
        }
        if let Some(v) = lookup("FINPROOF_KEEP_FAILED") {
            config.retention_failed = parse_env("FINPROOF_KEEP_FAILED", &v)?;
        }
        if let Some(v) = lookup("FINPROOF_ANALYZER_TIMEOUT_SECS") {
            config.analyzer_timeout_secs = Some(parse_env("FINPROOF_ANALYZER_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("FINPROOF_LOG_FORMAT") {
            config.log_format = v.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "FINPROOF_LOG_FORMAT".to_string(),
                value: v.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_period.trim().is_empty() {
            return Err(ConfigError::Invalid("data_period must not be empty".to_string()));
        }

        if self.default_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "default_batch_size must be greater than 0".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.analyzer_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "analyzer_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Analyzer deadline as a duration
    pub fn analyzer_timeout(&self) -> Option<Duration> {
        self.analyzer_timeout_secs.map(Duration::from_secs)
    }

    /// Job store file, defaulting to `jobs.json` under the data directory
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("jobs.json"))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    data_dir: Option<PathBuf>,
    store_path: Option<PathBuf>,
    data_period: Option<String>,
    default_batch_size: Option<usize>,
    concurrency: Option<usize>,
    retention_completed: Option<usize>,
    retention_failed: Option<usize>,
    analyzer_timeout_secs: Option<u64>,
    log_format: Option<LogFormat>,
}

impl AppConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn data_period(mut self, period: impl Into<String>) -> Self {
        self.data_period = Some(period.into());
        self
    }

    pub fn default_batch_size(mut self, size: usize) -> Self {
        self.default_batch_size = Some(size);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Set how many completed and failed jobs cleanup keeps
    pub fn retention(mut self, completed: usize, failed: usize) -> Self {
        self.retention_completed = Some(completed);
        self.retention_failed = Some(failed);
        self
    }

    pub fn analyzer_timeout_secs(mut self, secs: u64) -> Self {
        self.analyzer_timeout_secs = Some(secs);
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            store_path: self.store_path,
            data_period: self.data_period.unwrap_or(defaults.data_period),
            default_batch_size: self.default_batch_size.unwrap_or(defaults.default_batch_size),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            retention_completed: self.retention_completed.unwrap_or(defaults.retention_completed),
            retention_failed: self.retention_failed.unwrap_or(defaults.retention_failed),
            analyzer_timeout_secs: self.analyzer_timeout_secs,
            log_format: self.log_format.unwrap_or(defaults.log_format),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.data_period, "1y");
        assert_eq!(config.retention_completed, 20);
        assert_eq!(config.retention_failed, 10);
        assert!(config.analyzer_timeout().is_none());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.resolved_store_path(),
            PathBuf::from(".finproof").join("jobs.json")
        );
    }

    #[test]
    fn test_config_builder() {
        let config = AppConfig::builder()
            .data_period("6mo")
            .concurrency(8)
            .retention(5, 2)
            .analyzer_timeout_secs(30)
            .build()
            .unwrap();

        assert_eq!(config.data_period, "6mo");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.retention_failed, 2);
        assert_eq!(config.analyzer_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let result = AppConfig::builder().concurrency(0).build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("FINPROOF_DATA_PERIOD", "2y"),
            ("FINPROOF_CONCURRENCY", "2"),
            ("FINPROOF_LOG_FORMAT", "json"),
            ("FINPROOF_STORE_PATH", "/tmp/jobs.json"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.data_period, "2y");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.resolved_store_path(), PathBuf::from("/tmp/jobs.json"));
    }

    #[test]
    fn test_from_lookup_invalid_number() {
        let err = AppConfig::from_lookup(|k| {
            (k == "FINPROOF_BATCH_SIZE").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("FINPROOF_BATCH_SIZE"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"concurrency": 3}"#).unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.data_period, "1y");
    }
}

//! Pipeline configuration file support.
//!
//! Provides the configuration structure and its discovery/loading rules.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use upcycle_abstraction::ModelParameters;

/// Default engine.
pub const DEFAULT_ENGINE: &str = "gemini";
/// Default model ID.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model provider (`gemini`, `mock`)
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Model ID
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; falls back to the provider's environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Endpoint override
    #[serde(default)]
    pub base_url: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Output token cap
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_engine() -> String {
    DEFAULT_ENGINE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_level: None,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A partially specified configuration, as found in one file.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigOverlay {
    engine: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    request_timeout_secs: Option<u64>,
    log_level: Option<String>,
}

impl PipelineConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.merge_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".upcycle")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".upcyclerc")
    }

    /// Discover and load configuration.
    ///
    /// Precedence, lowest first:
    /// 1. Defaults
    /// 2. Global config (~/.upcycle/config.toml)
    /// 3. Local config (./.upcyclerc)
    /// 4. Environment (`UPCYCLE_ENGINE`, `UPCYCLE_MODEL`)
    ///
    /// Missing files are skipped; malformed ones are an error.
    pub fn discover_and_load() -> ConfigResult<Self> {
        let mut config = Self::default();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            if path.exists() {
                config.merge_file(&path)?;
            }
        }
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlays the values set in `path` onto this configuration.
    pub fn merge_file(&mut self, path: &Path) -> ConfigResult<()> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let overlay: ConfigOverlay = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        self.merge(overlay);
        Ok(())
    }

    fn merge(&mut self, other: ConfigOverlay) {
        if let Some(engine) = other.engine {
            self.engine = engine;
        }
        if let Some(model) = other.model {
            self.model = model;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
        if let Some(secs) = other.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(engine) = lookup("UPCYCLE_ENGINE").filter(|v| !v.is_empty()) {
            self.engine = engine;
        }
        if let Some(model) = lookup("UPCYCLE_MODEL").filter(|v| !v.is_empty()) {
            self.model = model;
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue("model must not be empty".to_string()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::InvalidValue(format!(
                    "temperature must be between 0 and 2, got {}",
                    t
                )));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Sampling parameters for the executor.
    pub fn model_parameters(&self) -> ModelParameters {
        ModelParameters {
            temperature: self.temperature,
            top_p: None,
            max_tokens: self.max_tokens,
            stop_sequences: None,
            response_format: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.engine, "gemini");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", "model = \"gemini-1.5-pro\"\ntemperature = 0.4\n");

        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.engine, "gemini");
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.temperature, Some(0.4));
        assert_eq!(config.model_parameters().temperature, Some(0.4));
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let dir = TempDir::new().unwrap();
        let global = write(&dir, "global.toml", "engine = \"mock\"\nmax_tokens = 256\n");
        let local = write(&dir, "local.toml", "engine = \"gemini\"\n");

        let mut config = PipelineConfig::default();
        config.merge_file(&global).unwrap();
        config.merge_file(&local).unwrap();

        assert_eq!(config.engine, "gemini");
        assert_eq!(config.max_tokens, Some(256));
    }

    #[test]
    fn test_env_overrides_files() {
        let env: HashMap<&str, &str> = [("UPCYCLE_MODEL", "gemini-exp"), ("UPCYCLE_ENGINE", "")]
            .into_iter()
            .collect();
        let mut config = PipelineConfig { engine: "mock".to_string(), ..PipelineConfig::default() };
        config.apply_env(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.model, "gemini-exp");
        assert_eq!(config.engine, "mock");
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineConfig::load_from_file(Path::new("/nonexistent/upcycle.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "temperature = \"hot\"\n");
        assert!(matches!(PipelineConfig::load_from_file(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_out_of_range_values() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "hot.toml", "temperature = 3.5\n");
        assert!(matches!(PipelineConfig::load_from_file(&path), Err(ConfigError::InvalidValue(_))));

        let path = write(&dir, "zero.toml", "request_timeout_secs = 0\n");
        assert!(matches!(PipelineConfig::load_from_file(&path), Err(ConfigError::InvalidValue(_))));
    }
}

//! CLI configuration loading and executor wiring.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use upcycle_core::{FlowExecutor, PipelineConfig};
use upcycle_models::{ModelConfig, ModelFactory};

/// Values given on the command line. They win over every other source.
#[derive(Debug, Default)]
pub struct Overrides {
    pub engine: Option<String>,
    pub model: Option<String>,
    pub log_level: Option<String>,
}

/// Load and merge configuration.
///
/// Configuration precedence:
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Explicit `--config` file, or the local (./.upcyclerc) then global
///    (~/.upcycle/config.toml) files
/// 4. Defaults
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => {
            let mut config = PipelineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => PipelineConfig::discover_and_load().context("Failed to load configuration")?,
    };

    if let Some(engine) = overrides.engine {
        config.engine = engine;
    }
    if let Some(model) = overrides.model {
        config.model = model;
    }
    if overrides.log_level.is_some() {
        config.log_level = overrides.log_level;
    }
    config.validate()?;
    Ok(config)
}

/// Creates the model named by `config` and wraps it in an executor.
pub fn build_executor(config: &PipelineConfig) -> Result<FlowExecutor> {
    let model_type = ModelFactory::parse_type(&config.engine)?;
    let mut model_config = ModelConfig::new(model_type, config.model.clone())
        .with_timeout(config.request_timeout());
    if let Some(api_key) = &config.api_key {
        model_config = model_config.with_api_key(api_key.clone());
    }
    if let Some(base_url) = &config.base_url {
        model_config = model_config.with_base_url(base_url.clone());
    }

    debug!(engine = %config.engine, model = %config.model, "Building flow executor");
    let model = ModelFactory::create(model_config)
        .with_context(|| format!("Failed to initialize the {} engine", config.engine))?;
    Ok(FlowExecutor::new(model).with_parameters(config.model_parameters()))
}

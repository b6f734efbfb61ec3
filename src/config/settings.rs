//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub preparation: PreparationConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Retry policy for generation requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

/// Client-side image preparation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreparationConfig {
    #[serde(default = "default_max_dim")]
    pub max_dim: u32,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_max_dim() -> u32 {
    1920
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_jpeg_quality() -> u8 {
    90
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            max_dim: default_max_dim(),
            max_bytes: default_max_bytes(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Simulated generation service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_min_latency")]
    pub min_latency_ms: u64,
    #[serde(default = "default_max_latency")]
    pub max_latency_ms: u64,
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_latency() -> u64 {
    1000
}

fn default_max_latency() -> u64 {
    2000
}

fn default_failure_rate() -> f64 {
    0.2
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: default_min_latency(),
            max_latency_ms: default_max_latency(),
            failure_rate: default_failure_rate(),
            seed: None,
        }
    }
}

/// History persistence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub base_path: String,
    #[serde(default = "default_history_key")]
    pub history_key: String,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_storage_path() -> String {
    "./studio_data".to_string()
}

fn default_history_key() -> String {
    "react-ai-studio-mini-history".to_string()
}

fn default_history_capacity() -> usize {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            history_key: default_history_key(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("generation.max_attempts", default_max_attempts() as i64)?
            .set_default("generation.initial_backoff_ms", default_initial_backoff() as i64)?
            .set_default("preparation.max_dim", default_max_dim() as i64)?
            .set_default("preparation.max_bytes", default_max_bytes() as i64)?
            .set_default("preparation.jpeg_quality", default_jpeg_quality() as i64)?
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with STUDIO__)
            .add_source(
                Environment::with_prefix("STUDIO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_attempts == 0 {
            return Err(invalid("generation.max_attempts must be at least 1"));
        }
        if self.preparation.max_dim == 0 {
            return Err(invalid("preparation.max_dim cannot be 0"));
        }
        if !(1..=100).contains(&self.preparation.jpeg_quality) {
            return Err(invalid(format!(
                "preparation.jpeg_quality must be within 1..=100, got {}",
                self.preparation.jpeg_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.simulator.failure_rate) {
            return Err(invalid(format!(
                "simulator.failure_rate must be within [0, 1], got {}",
                self.simulator.failure_rate
            )));
        }
        if self.simulator.min_latency_ms > self.simulator.max_latency_ms {
            return Err(invalid(format!(
                "simulator latency range is inverted: {}..{}",
                self.simulator.min_latency_ms, self.simulator.max_latency_ms
            )));
        }
        if self.storage.history_capacity == 0 {
            return Err(invalid("storage.history_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Config(config::ConfigError::Message(message.into()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            preparation: PreparationConfig::default(),
            simulator: SimulatorConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

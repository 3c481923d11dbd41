//! Configuration management for the document QA service
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files under `config/`
//! - Environment variables (DOCQA__ prefix, `__` as the section separator)

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, AuditConfig, IndexConfig, LlmSettings, ObservabilityConfig,
    RetrievalConfig, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

//! LLM Factory - Provider Abstraction Layer
//!
//! Creates LLM backends from configuration. The pipeline holds two
//! backends built here once at startup: the response model (query rewriting
//! and answer generation) and the rerank model.
//!
//! ## Supported Providers
//! - **Groq / OpenAI / Google**: OpenAI-compatible chat completions
//! - **Anthropic**: Claude Messages API
//! - **Ollama**: local models
//!
//! ## Example
//! ```ignore
//! let config = LlmProviderConfig::from_settings(&settings.llm, settings.llm.rerank_model());
//! let reranker_llm = LlmFactory::create_backend(&config)?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use docqa_config::constants::{endpoints, providers};
use docqa_config::LlmSettings;

use crate::backend::LlmBackend;
use crate::claude::{ClaudeBackend, ClaudeConfig};
use crate::ollama::{OllamaBackend, OllamaConfig};
use crate::openai::{OpenAIBackend, OpenAIConfig};
use crate::LlmError;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAI,
    Groq,
    Google,
    Anthropic,
}

impl LlmProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            providers::OLLAMA | "local" => Some(LlmProvider::Ollama),
            providers::OPENAI | "gpt" => Some(LlmProvider::OpenAI),
            providers::GROQ => Some(LlmProvider::Groq),
            providers::GOOGLE | "gemini" => Some(LlmProvider::Google),
            providers::ANTHROPIC | "claude" => Some(LlmProvider::Anthropic),
            _ => None,
        }
    }

    /// Default API base URL
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => endpoints::OLLAMA_DEFAULT,
            LlmProvider::OpenAI => endpoints::OPENAI_DEFAULT,
            LlmProvider::Groq => endpoints::GROQ_DEFAULT,
            LlmProvider::Google => endpoints::GOOGLE_DEFAULT,
            LlmProvider::Anthropic => endpoints::ANTHROPIC_DEFAULT,
        }
    }
}

/// Unified LLM provider configuration
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl LlmProviderConfig {
    /// Create config for a provider and model
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: None,
            endpoint: None,
            model: model.into(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }

    /// Build from settings for one of the configured models
    pub fn from_settings(settings: &LlmSettings, model: String) -> Result<Self, LlmError> {
        let provider = LlmProvider::parse(&settings.provider).ok_or_else(|| {
            LlmError::Configuration(format!("Unsupported provider: {}", settings.provider))
        })?;

        Ok(Self {
            provider,
            api_key: settings.api_key(),
            endpoint: Some(settings.endpoint()),
            model,
            max_tokens: settings.max_tokens as usize,
            temperature: settings.temperature,
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }

    /// Set API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.provider.default_endpoint().to_string())
    }

    fn require_api_key(&self) -> Result<String, LlmError> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LlmError::Configuration(format!("{:?} requires an API key", self.provider))
            })
    }
}

/// Factory for creating LLM backends
pub struct LlmFactory;

impl LlmFactory {
    /// Create a backend for the given provider config
    pub fn create_backend(config: &LlmProviderConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
        tracing::info!(
            provider = ?config.provider,
            model = %config.model,
            "Creating LLM backend"
        );

        match config.provider {
            LlmProvider::Anthropic => {
                let claude_config = ClaudeConfig::new(config.require_api_key()?)
                    .with_model(&config.model)
                    .with_max_tokens(config.max_tokens)
                    .with_temperature(config.temperature)
                    .with_timeout(config.timeout)
                    .with_endpoint(config.endpoint());

                Ok(Arc::new(ClaudeBackend::new(claude_config)?))
            },

            LlmProvider::Ollama => {
                let ollama_config = OllamaConfig {
                    model: config.model.clone(),
                    endpoint: config.endpoint(),
                    max_tokens: config.max_tokens,
                    temperature: config.temperature,
                    timeout: config.timeout,
                    ..Default::default()
                };

                Ok(Arc::new(OllamaBackend::new(ollama_config)?))
            },

            LlmProvider::OpenAI | LlmProvider::Groq | LlmProvider::Google => {
                let mut openai_config = OpenAIConfig::compatible(
                    config.endpoint(),
                    config.require_api_key()?,
                    &config.model,
                );
                openai_config.max_tokens = config.max_tokens;
                openai_config.temperature = config.temperature;
                openai_config.timeout = config.timeout;

                Ok(Arc::new(OpenAIBackend::new(openai_config)?))
            },
        }
    }

    /// Create the (response, rerank) backend pair from settings
    pub fn from_settings(
        settings: &LlmSettings,
    ) -> Result<(Arc<dyn LlmBackend>, Arc<dyn LlmBackend>), LlmError> {
        let response = Self::create_backend(&LlmProviderConfig::from_settings(
            settings,
            settings.response_model(),
        )?)?;
        let rerank = Self::create_backend(&LlmProviderConfig::from_settings(
            settings,
            settings.rerank_model(),
        )?)?;

        Ok((response, rerank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("anthropic"), Some(LlmProvider::Anthropic));
        assert_eq!(LlmProvider::parse("Claude"), Some(LlmProvider::Anthropic));
        assert_eq!(LlmProvider::parse("ollama"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::parse("groq"), Some(LlmProvider::Groq));
        assert_eq!(LlmProvider::parse("gemini"), Some(LlmProvider::Google));
        assert_eq!(LlmProvider::parse("unknown"), None);
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = LlmProviderConfig::new(LlmProvider::Ollama, "qwen2.5:7b");
        let backend = LlmFactory::create_backend(&config).unwrap();
        assert_eq!(backend.model_name(), "qwen2.5:7b");
    }

    #[test]
    fn test_remote_provider_requires_key() {
        let config = LlmProviderConfig::new(LlmProvider::Groq, "llama");
        assert!(matches!(
            LlmFactory::create_backend(&config),
            Err(LlmError::Configuration(_))
        ));

        let config = config.with_api_key("gsk-test");
        assert!(LlmFactory::create_backend(&config).is_ok());
    }

    #[test]
    fn test_from_settings_builds_both_models() {
        let settings = LlmSettings {
            provider: "openai".to_string(),
            api_key: Some("sk-test".to_string()),
            ..LlmSettings::default()
        };
        let (response, rerank) = LlmFactory::from_settings(&settings).unwrap();
        assert_eq!(response.model_name(), "gpt-4o");
        assert_eq!(rerank.model_name(), "gpt-4o-mini");
    }
}

//! LLM integration for the QA pipeline
//!
//! Features:
//! - Multiple backend support (Ollama, OpenAI-compatible, Claude)
//! - Free-form JSON-object and schema-constrained response formats
//! - Provider factory driven by `docqa-config` settings

pub mod backend;
pub mod claude;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod prompt;

pub use backend::{FinishReason, GenerationResult, LlmBackend};
pub use claude::{ClaudeBackend, ClaudeConfig};
pub use factory::{LlmFactory, LlmProvider, LlmProviderConfig};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use prompt::{Message, ResponseFormat, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Short variant name, used as `error_type` in error records
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Generation(_) => "GenerationError",
            LlmError::Api(_) => "ApiError",
            LlmError::Network(_) => "NetworkError",
            LlmError::InvalidResponse(_) => "InvalidResponseError",
            LlmError::Timeout => "TimeoutError",
            LlmError::ModelNotFound(_) => "ModelNotFoundError",
            LlmError::Configuration(_) => "ConfigurationError",
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for docqa_core::Error {
    fn from(err: LlmError) -> Self {
        docqa_core::Error::Llm(err.to_string())
    }
}

//! Backend trait and shared HTTP plumbing
//!
//! Every backend is a single request/response call: no streaming and no
//! retries. Timeouts come from the HTTP client and surface as
//! `LlmError::Timeout`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::prompt::{Message, ResponseFormat};
use crate::LlmError;

/// One completed generation
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text (for schema calls, the JSON document)
    pub text: String,
    /// Completion tokens reported by the provider, 0 when unknown
    pub tokens: usize,
    pub total_time_ms: u64,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// Chat model seam used by the rewriter, reranker and answer generator
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response in the requested format
    async fn generate(
        &self,
        messages: &[Message],
        format: &ResponseFormat,
    ) -> Result<GenerationResult, LlmError>;

    /// Cheap reachability probe
    async fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;

    /// Rough token estimate (~4 graphemes per token)
    fn estimate_tokens(&self, text: &str) -> usize {
        use unicode_segmentation::UnicodeSegmentation;

        text.graphemes(true).count().max(1) / 4
    }
}

/// HTTP client with the per-request timeout applied
pub(crate) fn http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into an error carrying the body text
pub(crate) async fn check_status(response: Response, model: &str) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND if body.contains("model") => {
            Err(LlmError::ModelNotFound(model.to_string()))
        },
        _ => Err(LlmError::Api(format!("HTTP {}: {}", status, body))),
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::{OllamaBackend, OllamaConfig};

    #[test]
    fn test_estimate_tokens() {
        let backend = OllamaBackend::new(OllamaConfig::default()).unwrap();
        assert_eq!(backend.estimate_tokens("abcdefgh"), 2);
        assert_eq!(backend.estimate_tokens(""), 0);
    }
}

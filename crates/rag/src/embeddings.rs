//! Ollama Embeddings
//!
//! Uses Ollama's embedding API for query vectors. The corpus was embedded
//! with an E5-family model, which expects queries as `"query: <text>"` and
//! passages as `"passage: <text>"`; only the query side runs here.

use std::time::Duration;

use docqa_config::constants::{embedding, endpoints, timeouts};
use docqa_config::IndexConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::RagError;

/// Ollama embedding configuration
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingConfig {
    /// Ollama API endpoint
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Embedding dimension
    pub embedding_dim: usize,
    /// Prefix prepended to every query
    pub query_prefix: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OLLAMA_DEFAULT.to_string(),
            model: embedding::MODEL.to_string(),
            embedding_dim: embedding::DIMENSION,
            query_prefix: embedding::QUERY_PREFIX.to_string(),
            timeout: Duration::from_secs(timeouts::INDEX_REQUEST_SECS),
        }
    }
}

impl From<&IndexConfig> for OllamaEmbeddingConfig {
    fn from(config: &IndexConfig) -> Self {
        Self {
            endpoint: config.embedding_endpoint.clone(),
            model: config.embedding_model.clone(),
            embedding_dim: config.embedding_dim,
            query_prefix: config.query_prefix.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama embedder
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaEmbeddingConfig,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: OllamaEmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Text actually sent to the model for a query
    pub fn format_query(&self, query: &str) -> String {
        format!("{}{}", self.config.query_prefix, query)
    }

    /// Embed a query with the configured prefix
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: self.format_query(query),
        };

        let url = format!("{}/api/embed", self.config.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::Embedding(format!("Ollama request timed out: {}", e))
                } else {
                    RagError::Embedding(format!("Ollama request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Ollama embedding failed: {} - {}",
                status, text
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        let vector = embed_response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))?;

        if vector.len() != self.config.embedding_dim {
            tracing::warn!(
                expected = self.config.embedding_dim,
                actual = vector.len(),
                model = %self.config.model,
                "Embedding dimension differs from configuration"
            );
        }

        Ok(vector)
    }

    /// Get embedding dimension
    pub fn dim(&self) -> usize {
        self.config.embedding_dim
    }

    /// Get model name
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OllamaEmbeddingConfig::default();
        assert_eq!(config.embedding_dim, 768);
        assert_eq!(config.query_prefix, "query: ");
    }

    #[test]
    fn test_query_prefix_applied() {
        let embedder = OllamaEmbedder::new(OllamaEmbeddingConfig::default()).unwrap();
        assert_eq!(
            embedder.format_query("What accuracy?"),
            "query: What accuracy?"
        );
    }

    #[test]
    fn test_from_index_config() {
        let index = IndexConfig {
            query_prefix: String::new(),
            timeout_secs: 5,
            ..IndexConfig::default()
        };
        let config = OllamaEmbeddingConfig::from(&index);
        assert!(config.query_prefix.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}

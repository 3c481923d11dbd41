//! Vector Store using Qdrant
//!
//! Dense similarity search over the pre-built chunk collection. Points carry
//! the chunk text and its citation metadata in the payload.

use std::collections::HashMap;
use std::time::Duration;

use docqa_config::constants::{embedding, endpoints, timeouts};
use docqa_config::IndexConfig;
use docqa_core::Chunk;
use qdrant_client::{
    qdrant::{value::Kind, SearchPointsBuilder, Value},
    Qdrant,
};

use crate::RagError;

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// Collection name
    pub collection: String,
    /// Vector dimension
    pub vector_dim: usize,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::QDRANT_DEFAULT.to_string(),
            collection: "rag_demo".to_string(),
            vector_dim: embedding::DIMENSION,
            api_key: None,
            timeout: Duration::from_secs(timeouts::INDEX_REQUEST_SECS),
        }
    }
}

impl From<&IndexConfig> for VectorStoreConfig {
    fn from(config: &IndexConfig) -> Self {
        Self {
            endpoint: config.qdrant_endpoint.clone(),
            collection: config.collection.clone(),
            vector_dim: config.embedding_dim,
            api_key: config.qdrant_api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Vector store client
pub struct VectorStore {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl VectorStore {
    /// Create a new vector store connection
    pub fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint).timeout(config.timeout);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Search by vector, best match first
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Chunk>, RagError> {
        let request = SearchPointsBuilder::new(
            &self.config.collection,
            query_embedding.to_vec(),
            top_k as u64,
        )
        .with_payload(true);

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| chunk_from_payload(point.payload))
            .collect())
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }
}

fn string_value(value: &Value) -> Option<&str> {
    match value.kind {
        Some(Kind::StringValue(ref s)) => Some(s.as_str()),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value.kind {
        Some(Kind::IntegerValue(n)) => Some(n),
        Some(Kind::DoubleValue(f)) if f.fract() == 0.0 => Some(f as i64),
        Some(Kind::StringValue(ref s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Build a chunk from a point payload
///
/// Content is read from `content` or the older `text` key. Ingestion tools
/// that kept loader metadata store the full path under `source` and a 0-based
/// `page`; both are normalized to the file name and a 1-based page number.
pub(crate) fn chunk_from_payload(payload: HashMap<String, Value>) -> Chunk {
    let content = payload
        .get("content")
        .or_else(|| payload.get("text"))
        .and_then(string_value)
        .unwrap_or_default()
        .to_string();

    let source_file = payload
        .get("source_file")
        .and_then(string_value)
        .map(str::to_string)
        .or_else(|| {
            payload.get("source").and_then(string_value).map(|path| {
                path.rsplit(['/', '\\'])
                    .next()
                    .unwrap_or(path)
                    .to_string()
            })
        });

    let page_number = payload
        .get("page_number")
        .and_then(integer_value)
        .or_else(|| payload.get("page").and_then(integer_value).map(|p| p + 1))
        .and_then(|p| u32::try_from(p).ok());

    let chunk_id = payload
        .get("chunk_id")
        .and_then(string_value)
        .map(str::to_string);

    Chunk {
        content,
        source_file,
        page_number,
        chunk_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_config_from_index() {
        let index = IndexConfig::default();
        let config = VectorStoreConfig::from(&index);
        assert_eq!(config.collection, "rag_demo");
        assert_eq!(config.vector_dim, 768);
        assert_eq!(config.timeout, Duration::from_secs(30));

        let slow = IndexConfig {
            timeout_secs: 5,
            ..IndexConfig::default()
        };
        assert_eq!(VectorStoreConfig::from(&slow).timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_chunk_from_payload() {
        let chunk = chunk_from_payload(payload(&[
            ("content", "The model achieves 92% accuracy.".into()),
            ("source_file", "paper.pdf".into()),
            ("page_number", 2i64.into()),
            ("chunk_id", "paper.pdf, page 2, chunk 7".into()),
        ]));

        assert_eq!(chunk.content, "The model achieves 92% accuracy.");
        assert_eq!(chunk.source_file.as_deref(), Some("paper.pdf"));
        assert_eq!(chunk.page_number, Some(2));
        assert_eq!(chunk.source_label(), "paper.pdf, page 2, chunk 7");
    }

    #[test]
    fn test_loader_metadata_is_normalized() {
        let chunk = chunk_from_payload(payload(&[
            ("text", "legacy".into()),
            ("source", "data/raw/paper.pdf".into()),
            ("page", 0i64.into()),
        ]));

        assert_eq!(chunk.content, "legacy");
        assert_eq!(chunk.source_file.as_deref(), Some("paper.pdf"));
        assert_eq!(chunk.page_number, Some(1));
        assert!(chunk.chunk_id.is_none());
    }
}

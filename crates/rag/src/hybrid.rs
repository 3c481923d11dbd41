//! Document index backed by Qdrant (dense) and Tantivy (lexical)

use std::sync::Arc;

use async_trait::async_trait;
use docqa_config::IndexConfig;
use docqa_core::{Chunk, DocumentIndex};

use crate::embeddings::{OllamaEmbedder, OllamaEmbeddingConfig};
use crate::sparse_search::{SparseConfig, SparseIndex};
use crate::vector_store::{VectorStore, VectorStoreConfig};
use crate::RagError;

/// `DocumentIndex` over the pre-built corpus stores
///
/// Handles are opened once at startup and shared read-only by every request.
pub struct HybridIndex {
    embedder: OllamaEmbedder,
    vector_store: VectorStore,
    sparse: Arc<SparseIndex>,
}

impl HybridIndex {
    pub fn new(embedder: OllamaEmbedder, vector_store: VectorStore, sparse: SparseIndex) -> Self {
        Self {
            embedder,
            vector_store,
            sparse: Arc::new(sparse),
        }
    }

    /// Open every store named in the index settings
    pub fn from_config(config: &IndexConfig) -> Result<Self, RagError> {
        let embedder = OllamaEmbedder::new(OllamaEmbeddingConfig::from(config))?;
        let vector_store = VectorStore::new(VectorStoreConfig::from(config))?;
        let sparse = SparseIndex::new(SparseConfig {
            index_path: config.sparse_index_path.clone(),
            ..SparseConfig::default()
        })?;

        tracing::info!(
            collection = %vector_store.collection(),
            embedding_model = %embedder.model(),
            lexical_docs = sparse.doc_count(),
            "Hybrid index ready"
        );

        Ok(Self::new(embedder, vector_store, sparse))
    }

    async fn dense(&self, query: &str, k: usize) -> Result<Vec<Chunk>, RagError> {
        let embedding = self.embedder.embed_query(query).await?;
        self.vector_store.search(&embedding, k).await
    }

    async fn lexical(&self, query: &str, k: usize) -> Result<Vec<Chunk>, RagError> {
        // Tantivy search is CPU-bound; keep it off the async workers
        let sparse = Arc::clone(&self.sparse);
        let query = query.to_string();

        tokio::task::spawn_blocking(move || sparse.search(&query, k))
            .await
            .map_err(|e| RagError::Search(format!("Sparse search task failed: {}", e)))?
    }
}

#[async_trait]
impl DocumentIndex for HybridIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> docqa_core::Result<Vec<Chunk>> {
        Ok(self.dense(query, k).await?)
    }

    async fn lexical_search(&self, query: &str, k: usize) -> docqa_core::Result<Vec<Chunk>> {
        Ok(self.lexical(query, k).await?)
    }

    fn name(&self) -> &str {
        "hybrid"
    }
}

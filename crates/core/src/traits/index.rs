//! Document index trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Chunk, Result};

/// Search backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Embedding similarity search
    Dense,
    /// BM25-style term search
    Lexical,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Dense => "dense",
            SearchKind::Lexical => "lexical",
        }
    }
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-built index over the corpus chunks
///
/// Implementations are long-lived and shared across concurrent requests,
/// so every method takes `&self`.
///
/// # Example
///
/// ```ignore
/// let index: Arc<dyn DocumentIndex> = Arc::new(HybridIndex::new(embedder, vector_store, sparse));
/// let dense = index.similarity_search("model accuracy", 5).await?;
/// let lexical = index.lexical_search("model accuracy", 5).await?;
/// ```
#[async_trait]
pub trait DocumentIndex: Send + Sync + 'static {
    /// Dense vector similarity search, best match first
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>>;

    /// Sparse lexical search, best match first
    async fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>>;

    /// Dispatch on search kind
    async fn search(&self, kind: SearchKind, query: &str, k: usize) -> Result<Vec<Chunk>> {
        match kind {
            SearchKind::Dense => self.similarity_search(query, k).await,
            SearchKind::Lexical => self.lexical_search(query, k).await,
        }
    }

    /// Index name for logging
    fn name(&self) -> &str;
}

//! Retrieval stages of the QA pipeline
//!
//! Features:
//! - Dense vector search via Qdrant with Ollama query embeddings
//! - Sparse BM25 search via Tantivy
//! - `HybridIndex` implementing the core `DocumentIndex` trait
//! - LLM query rewriting into three retrieval-oriented variants
//! - Parallel fan-out of every variant to both backends with a full join
//! - Reciprocal Rank Fusion with positional rank inference
//! - LLM reranking with content-adaptive previews and first-N fallback

pub mod dispatcher;
pub mod embeddings;
pub mod fusion;
pub mod hybrid;
pub mod reranker;
pub mod rewriter;
pub mod sparse_search;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use dispatcher::{query_variants, RetrievalDispatcher};
pub use embeddings::{OllamaEmbedder, OllamaEmbeddingConfig};
pub use fusion::{rrf_fusion, DedupKey, FusedChunk};
pub use hybrid::HybridIndex;
pub use reranker::{preview, LlmReranker, RerankOutcome};
pub use rewriter::QueryRewriter;
pub use sparse_search::{SparseConfig, SparseIndex};
pub use vector_store::{VectorStore, VectorStoreConfig};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query rewrite failed: {0}")]
    Rewrite(String),

    #[error("Rerank failed: {0}")]
    Rerank(String),
}

impl From<RagError> for docqa_core::Error {
    fn from(err: RagError) -> Self {
        docqa_core::Error::Index(err.to_string())
    }
}

impl From<docqa_core::Error> for RagError {
    fn from(err: docqa_core::Error) -> Self {
        RagError::Search(err.to_string())
    }
}

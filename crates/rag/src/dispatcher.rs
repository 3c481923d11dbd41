//! Hybrid retrieval fan-out
//!
//! Every query variant is sent to both the dense and the lexical backend as
//! its own task. The dispatcher joins on all of them before returning, so a
//! caller never sees a partial candidate set: either every call succeeded
//! and the results are concatenated, or the first failure (in dispatch
//! order) is returned after the rest have finished.

use std::sync::Arc;

use docqa_config::RetrievalConfig;
use docqa_core::{Chunk, DocumentIndex, SearchKind};
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::RagError;

const BACKENDS: [SearchKind; 2] = [SearchKind::Dense, SearchKind::Lexical];

/// Rewritten queries followed by the original question
///
/// Duplicates are kept: a rewrite identical to the question is searched
/// twice and contributes twice to fusion.
pub fn query_variants(rewritten_queries: &[String], question: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(rewritten_queries.len() + 1);
    variants.extend(rewritten_queries.iter().cloned());
    variants.push(question.to_string());
    variants
}

/// Parallel dispatcher over a shared `DocumentIndex`
pub struct RetrievalDispatcher {
    index: Arc<dyn DocumentIndex>,
    per_call_k: usize,
    max_concurrent: usize,
}

impl RetrievalDispatcher {
    pub fn new(index: Arc<dyn DocumentIndex>, config: &RetrievalConfig) -> Self {
        Self {
            index,
            per_call_k: config.per_call_k,
            max_concurrent: config.max_concurrent_searches.max(1),
        }
    }

    /// Search every (variant, backend) pair and concatenate the results
    ///
    /// Output order is variant order, dense before lexical within a variant,
    /// each call's chunks in the backend's rank order. No deduplication.
    pub async fn dispatch(&self, variants: &[String]) -> Result<Vec<Chunk>, RagError> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = Vec::with_capacity(variants.len() * BACKENDS.len());

        for variant in variants {
            for kind in BACKENDS {
                let index = Arc::clone(&self.index);
                let permits = Arc::clone(&permits);
                let query = variant.clone();
                let k = self.per_call_k;

                tasks.push(tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| RagError::Search(e.to_string()))?;

                    index.search(kind, &query, k).await.map_err(|e| {
                        RagError::Search(format!("{} search for {:?} failed: {}", kind, query, e))
                    })
                }));
            }
        }

        let outcomes = join_all(tasks).await;

        let mut candidates = Vec::with_capacity(outcomes.len() * self.per_call_k);
        let mut first_error = None;

        for outcome in outcomes {
            let result = outcome
                .map_err(|e| RagError::Search(format!("Retrieval task failed: {}", e)))
                .and_then(|r| r);

            match result {
                Ok(chunks) => candidates.extend(chunks),
                Err(e) => {
                    tracing::warn!(error = %e, index = %self.index.name(), "Retrieval call failed");
                    first_error.get_or_insert(e);
                },
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::debug!(
            variants = variants.len(),
            calls = variants.len() * BACKENDS.len(),
            candidates = candidates.len(),
            "Retrieval fan-in complete"
        );

        Ok(candidates)
    }
}

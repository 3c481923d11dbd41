//! Query rewriting
//!
//! One LLM call turns the user question into three retrieval-oriented
//! variants that keep the question's named subject. The response must be a
//! JSON object `{"queries": [..]}`; anything else fails the request, there
//! is no fallback to the bare question.

use std::sync::Arc;

use docqa_config::constants::retrieval::REWRITE_COUNT;
use docqa_llm::{LlmBackend, Message, ResponseFormat};
use serde::Deserialize;

use crate::RagError;

#[derive(Debug, Deserialize)]
struct RewriteOutput {
    queries: Vec<String>,
}

/// LLM-backed query rewriter
pub struct QueryRewriter {
    llm: Arc<dyn LlmBackend>,
}

impl QueryRewriter {
    /// Create a new query rewriter with an LLM backend
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    /// Expand a question into up to three alternate search queries
    pub async fn rewrite(&self, question: &str) -> Result<Vec<String>, RagError> {
        let messages = [Message::user(Self::build_prompt(question))];

        let response = self
            .llm
            .generate(&messages, &ResponseFormat::JsonObject)
            .await
            .map_err(|e| RagError::Rewrite(format!("{}: {}", e.kind(), e)))?;

        let queries = Self::parse(&response.text)?;

        tracing::debug!(
            question = %question,
            queries = ?queries,
            model = %self.llm.model_name(),
            "Query rewritten"
        );

        Ok(queries)
    }

    fn build_prompt(question: &str) -> String {
        format!(
            r#"You optimize search queries for a retrieval system over a collection of PDF documents.

Rewrite the user's question into exactly {count} search queries that will retrieve the passages needed to answer it.

Constraints:
- Produce exactly {count} queries.
- Every query must keep the entity, paper title or subject named in the question.
- Do not widen the question to related topics or broader fields.
- Do not answer the question and do not explain anything.

Write the queries as:
1. A precise factual query aimed at the requested information.
2. A complete natural-language question.
3. A paraphrase that uses different wording with the same meaning.

User question:
{question}

Respond with a JSON object of this exact shape and nothing else:
{{"queries": ["query 1", "query 2", "query 3"]}}"#,
            count = REWRITE_COUNT,
            question = question,
        )
    }

    /// Strictly parse the model output
    ///
    /// The text must be a JSON object with a `queries` array of strings.
    /// Blank entries are dropped and at most three are kept; an empty list is
    /// an error.
    pub(crate) fn parse(text: &str) -> Result<Vec<String>, RagError> {
        let output: RewriteOutput = serde_json::from_str(text.trim())
            .map_err(|e| RagError::Rewrite(format!("JsonParseError: {}", e)))?;

        let queries: Vec<String> = output
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(REWRITE_COUNT)
            .collect();

        if queries.is_empty() {
            return Err(RagError::Rewrite(
                "Model returned no usable queries".to_string(),
            ));
        }

        if queries.len() != REWRITE_COUNT {
            tracing::warn!(
                expected = REWRITE_COUNT,
                actual = queries.len(),
                "Rewriter returned an unexpected number of queries"
            );
        }

        Ok(queries)
    }
}

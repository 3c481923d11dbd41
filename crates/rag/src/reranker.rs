//! LLM Reranker
//!
//! The rerank model sees every fused candidate as `[i] preview` and answers
//! with a schema-constrained `{"selected_ids": [..]}`. Previews are cut
//! according to what the chunk looks like:
//!
//! | content signal                                   | max  | head | tail |
//! |--------------------------------------------------|------|------|------|
//! | table, figure, parameter, coefficient, matrix, value | 1200 | 600 | 600 |
//! | author, reference, step, equation, formula       | 1000 | 500  | 500  |
//! | `def `, `class `, function, import, return       | 1000 | 500  | 500  |
//! | shorter than 600 chars                           | none |      |      |
//! | anything else                                    | 800  | 400  | 400  |
//!
//! A failed call, an unparsable reply or a selection with no usable index
//! falls back to the first `final_top_k` candidates in fusion order.

use std::collections::HashSet;
use std::sync::Arc;

use docqa_core::Chunk;
use docqa_llm::{LlmBackend, Message, ResponseFormat};
use serde::Deserialize;
use serde_json::json;

use crate::RagError;

const TABLE_KEYWORDS: &[&str] = &[
    "table",
    "figure",
    "parameter",
    "coefficient",
    "matrix",
    "value",
];
const LIST_KEYWORDS: &[&str] = &["author", "reference", "step", "equation", "formula"];
const CODE_KEYWORDS: &[&str] = &["def ", "class ", "function", "import", "return"];

const SHORT_CHUNK_CHARS: usize = 600;
const ELLIPSIS: &str = " ... ";
const SCHEMA_NAME: &str = "rerank_selection";

/// Preview window as (max chars, head chars, tail chars)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    max: usize,
    head: usize,
    tail: usize,
}

impl Window {
    const fn new(max: usize, head: usize, tail: usize) -> Self {
        Self { max, head, tail }
    }
}

fn window_for(text: &str, char_len: usize) -> Option<Window> {
    let lower = text.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if mentions(TABLE_KEYWORDS) {
        Some(Window::new(1200, 600, 600))
    } else if mentions(LIST_KEYWORDS) || mentions(CODE_KEYWORDS) {
        Some(Window::new(1000, 500, 500))
    } else if char_len < SHORT_CHUNK_CHARS {
        None
    } else {
        Some(Window::new(800, 400, 400))
    }
}

/// Single-line preview of a chunk for the rerank prompt
///
/// Newlines become spaces. Text longer than its window keeps the head and
/// tail joined by `" ... "`. Lengths count characters, not bytes.
pub fn preview(content: &str) -> String {
    let text = content.replace('\n', " ");
    let char_len = text.chars().count();

    match window_for(&text, char_len) {
        Some(w) if char_len > w.max => {
            let head: String = text.chars().take(w.head).collect();
            let tail: String = text.chars().skip(char_len - w.tail).collect();
            format!("{}{}{}", head, ELLIPSIS, tail)
        },
        _ => text,
    }
}

#[derive(Debug, Deserialize)]
struct RerankSelection {
    selected_ids: Vec<i64>,
}

/// Result of one rerank pass
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
    pub chunks: Vec<Chunk>,
    /// True when the first-N fallback was used
    pub fallback: bool,
}

/// LLM-backed reranker
pub struct LlmReranker {
    llm: Arc<dyn LlmBackend>,
    top_k: usize,
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn LlmBackend>, top_k: usize) -> Self {
        Self { llm, top_k }
    }

    /// Select and order the most relevant candidates
    ///
    /// Never fails: every error path degrades to the fusion-order fallback.
    pub async fn rerank(&self, question: &str, candidates: &[Chunk]) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome {
                chunks: Vec::new(),
                fallback: false,
            };
        }

        match self.select(question, candidates).await {
            Ok(indices) if !indices.is_empty() => {
                tracing::debug!(selected = ?indices, candidates = candidates.len(), "Reranked");
                RerankOutcome {
                    chunks: indices.into_iter().map(|i| candidates[i].clone()).collect(),
                    fallback: false,
                }
            },
            Ok(_) => self.fallback(candidates, "no valid indices selected"),
            Err(e) => self.fallback(candidates, &e.to_string()),
        }
    }

    fn fallback(&self, candidates: &[Chunk], reason: &str) -> RerankOutcome {
        tracing::warn!(
            reason = %reason,
            model = %self.llm.model_name(),
            "Reranking failed, using fusion order"
        );
        metrics::counter!("docqa_rerank_fallbacks_total").increment(1);

        RerankOutcome {
            chunks: candidates.iter().take(self.top_k).cloned().collect(),
            fallback: true,
        }
    }

    async fn select(&self, question: &str, candidates: &[Chunk]) -> Result<Vec<usize>, RagError> {
        let messages = [Message::user(self.build_prompt(question, candidates))];

        let response = self
            .llm
            .generate(&messages, &Self::response_format())
            .await
            .map_err(|e| RagError::Rerank(format!("{}: {}", e.kind(), e)))?;

        let selection: RerankSelection = serde_json::from_str(response.text.trim())
            .map_err(|e| RagError::Rerank(format!("JsonParseError: {}", e)))?;

        Ok(self.valid_indices(&selection.selected_ids, candidates.len()))
    }

    /// First `top_k` ids, minus out-of-range and repeated ones
    fn valid_indices(&self, ids: &[i64], len: usize) -> Vec<usize> {
        let mut seen = HashSet::new();
        ids.iter()
            .take(self.top_k)
            .filter_map(|&id| usize::try_from(id).ok())
            .filter(|&i| i < len && seen.insert(i))
            .collect()
    }

    fn build_prompt(&self, question: &str, candidates: &[Chunk]) -> String {
        let chunks: String = candidates
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] {}\n\n", i, preview(&chunk.content)))
            .collect();

        format!(
            r#"You judge how relevant document chunks are to a question. Pick the {top_k} chunks most useful for answering it.

Question: {question}

Chunks:
{chunks}
Guidelines:
1. Prefer chunks stating specific facts, numbers or direct answers.
2. Prefer chunks containing exactly the information asked for.
3. For questions about lists (authors, references, steps), prefer chunks with the complete list over passing mentions.
4. Skip chunks that only give background or loosely related material.
5. Return at most {top_k} chunk numbers, most relevant first.

Respond with JSON only."#,
            top_k = self.top_k,
            question = question,
            chunks = chunks,
        )
    }

    fn response_format() -> ResponseFormat {
        ResponseFormat::json_schema(
            SCHEMA_NAME,
            json!({
                "type": "object",
                "properties": {
                    "selected_ids": {
                        "type": "array",
                        "items": { "type": "integer" },
                        "description": "Selected chunk numbers, most relevant first"
                    }
                },
                "required": ["selected_ids"],
                "additionalProperties": false
            }),
        )
    }
}

//! Test doubles shared by the unit tests of this crate

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docqa_core::{Chunk, DocumentIndex, SearchKind};
use docqa_llm::{FinishReason, GenerationResult, LlmBackend, LlmError, Message, ResponseFormat};
use parking_lot::Mutex;

enum Reply {
    Text(String),
    Error(Option<LlmError>),
}

/// LLM that always gives the same reply and records every call
pub(crate) struct ScriptedLlm {
    reply: Mutex<Reply>,
    calls: Mutex<Vec<(String, ResponseFormat)>>,
}

impl ScriptedLlm {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            reply: Mutex::new(Reply::Text(text.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(error: LlmError) -> Self {
        Self {
            reply: Mutex::new(Reply::Error(Some(error))),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// (prompt text, format) per call
    pub(crate) fn calls(&self) -> Vec<(String, ResponseFormat)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn generate(
        &self,
        messages: &[Message],
        format: &ResponseFormat,
    ) -> Result<GenerationResult, LlmError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.lock().push((prompt, format.clone()));

        match &mut *self.reply.lock() {
            Reply::Text(text) => Ok(GenerationResult {
                text: text.clone(),
                tokens: 10,
                total_time_ms: 1,
                finish_reason: FinishReason::Stop,
            }),
            Reply::Error(error) => Err(error
                .take()
                .unwrap_or_else(|| LlmError::Generation("scripted failure".to_string()))),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// In-memory index with canned results per (backend, query)
#[derive(Default)]
pub(crate) struct MemoryIndex {
    results: HashMap<(SearchKind, String), Vec<Chunk>>,
    fail_on: Option<(SearchKind, String)>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) calls: AtomicUsize,
}

impl MemoryIndex {
    pub(crate) fn with(mut self, kind: SearchKind, query: &str, chunks: Vec<Chunk>) -> Self {
        self.results.insert((kind, query.to_string()), chunks);
        self
    }

    pub(crate) fn failing_on(mut self, kind: SearchKind, query: &str) -> Self {
        self.fail_on = Some((kind, query.to_string()));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn lookup(
        &self,
        kind: SearchKind,
        query: &str,
        k: usize,
    ) -> docqa_core::Result<Vec<Chunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.as_ref() == Some(&(kind, query.to_string())) {
            return Err(docqa_core::Error::Index(format!("{} backend down", kind)));
        }

        Ok(self
            .results
            .get(&(kind, query.to_string()))
            .map(|chunks| chunks.iter().take(k).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentIndex for MemoryIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> docqa_core::Result<Vec<Chunk>> {
        self.lookup(SearchKind::Dense, query, k).await
    }

    async fn lexical_search(&self, query: &str, k: usize) -> docqa_core::Result<Vec<Chunk>> {
        self.lookup(SearchKind::Lexical, query, k).await
    }

    fn name(&self) -> &str {
        "memory"
    }
}

//! Per-request working state
//!
//! Stages never mutate `RequestState` directly. Each returns a list of
//! `StateUpdate` commands that the pipeline applies in order, so every list
//! field says explicitly whether it is being replaced or extended.

use docqa_core::Chunk;
use serde::Serialize;

/// How a list field changes
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    /// Discard the current contents; `Replace(vec![])` clears
    Replace(Vec<T>),
    /// Extend the current contents
    Append(Vec<T>),
}

impl<T> FieldUpdate<T> {
    pub fn clear() -> Self {
        FieldUpdate::Replace(Vec::new())
    }

    fn apply(self, target: &mut Vec<T>) {
        match self {
            FieldUpdate::Replace(items) => *target = items,
            FieldUpdate::Append(items) => target.extend(items),
        }
    }
}

/// One field change produced by a stage
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Question(String),
    RewrittenQueries(FieldUpdate<String>),
    RawCandidates(FieldUpdate<Chunk>),
    FusedContext(FieldUpdate<Chunk>),
    RerankedContext(FieldUpdate<Chunk>),
    CacheHit(bool),
    AnswerMessage(String),
}

/// Working data for one question
///
/// Created per request and dropped after the response; nothing here is
/// persisted except through the audit log write in the generate stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestState {
    /// Trimmed question text
    pub question: String,
    pub rewritten_queries: Vec<String>,
    /// Every chunk from the current retrieval round, duplicates included
    pub raw_candidates: Vec<Chunk>,
    /// Deduplicated, ranked candidates
    pub fused_context: Vec<Chunk>,
    /// Context handed to the answer model
    pub reranked_context: Vec<Chunk>,
    pub cache_hit: bool,
    pub answer_message: Option<String>,
}

impl RequestState {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::Question(q) => self.question = q,
            StateUpdate::RewrittenQueries(u) => u.apply(&mut self.rewritten_queries),
            StateUpdate::RawCandidates(u) => u.apply(&mut self.raw_candidates),
            StateUpdate::FusedContext(u) => u.apply(&mut self.fused_context),
            StateUpdate::RerankedContext(u) => u.apply(&mut self.reranked_context),
            StateUpdate::CacheHit(hit) => self.cache_hit = hit,
            StateUpdate::AnswerMessage(text) => self.answer_message = Some(text),
        }
    }

    pub fn apply_all(&mut self, updates: impl IntoIterator<Item = StateUpdate>) {
        for update in updates {
            self.apply(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_question() {
        let state = RequestState::new("  What accuracy?\n");
        assert_eq!(state.question, "What accuracy?");
        assert!(!state.cache_hit);
        assert!(state.answer_message.is_none());
    }

    #[test]
    fn test_append_then_clear() {
        let mut state = RequestState::new("q");
        state.apply(StateUpdate::RawCandidates(FieldUpdate::Append(vec![Chunk::new("a")])));
        state.apply(StateUpdate::RawCandidates(FieldUpdate::Append(vec![
            Chunk::new("b"),
            Chunk::new("a"),
        ])));
        assert_eq!(state.raw_candidates.len(), 3);

        state.apply(StateUpdate::RawCandidates(FieldUpdate::clear()));
        assert!(state.raw_candidates.is_empty());
    }

    #[test]
    fn test_replace_discards_previous() {
        let mut state = RequestState::new("q");
        state.apply_all([
            StateUpdate::RewrittenQueries(FieldUpdate::Replace(vec!["a".into(), "b".into()])),
            StateUpdate::RewrittenQueries(FieldUpdate::Replace(vec!["c".into()])),
            StateUpdate::CacheHit(true),
            StateUpdate::AnswerMessage("done".into()),
        ]);

        assert_eq!(state.rewritten_queries, vec!["c"]);
        assert!(state.cache_hit);
        assert_eq!(state.answer_message.as_deref(), Some("done"));
    }
}

//! Cache lookup over the audit log

use std::sync::Arc;

use docqa_config::constants::answers;
use docqa_persistence::{AuditLog, CachedAnswer};

use crate::stage::Stage;
use crate::state::{RequestState, StateUpdate};

/// Render a prior answer the way it is returned to the caller
///
/// `"[Cached Response]\n\n<answer>"`, followed by `"\n\nSources:\n"` and the
/// citations one per line, each but the last ending in `;`.
pub fn format_cached_answer(cached: &CachedAnswer) -> String {
    let mut text = format!("{}\n\n{}", answers::CACHED_PREFIX, cached.answer);
    if !cached.citations.is_empty() {
        text.push_str("\n\n");
        text.push_str(answers::SOURCES_HEADING);
        text.push('\n');
        text.push_str(&cached.citations.join(";\n"));
    }
    text
}

/// Exact-match cache backed by the Q&A audit partitions
pub struct CacheLookup {
    audit: Arc<dyn AuditLog>,
}

impl CacheLookup {
    pub fn new(audit: Arc<dyn AuditLog>) -> Self {
        Self { audit }
    }

    /// State updates for the cache-check stage
    pub async fn check(&self, question: &str) -> Vec<StateUpdate> {
        match self.audit.find_answer(question).await {
            Some(cached) => {
                tracing::info!(question = %question, "Cache hit");
                metrics::counter!("docqa_cache_hits_total").increment(1);
                vec![
                    StateUpdate::CacheHit(true),
                    StateUpdate::AnswerMessage(format_cached_answer(&cached)),
                ]
            },
            None => {
                tracing::debug!(question = %question, "Cache miss");
                metrics::counter!("docqa_cache_misses_total").increment(1);
                vec![StateUpdate::CacheHit(false)]
            },
        }
    }

    /// Where control goes after the cache check
    pub fn route(state: &RequestState) -> Stage {
        Stage::CacheCheck.next(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_persistence::{JsonlAuditLog, PartitionLayout, QaRecord};

    #[test]
    fn test_format_with_citations() {
        let cached = CachedAnswer {
            question: "q".into(),
            answer: "The model reaches 92%.".into(),
            citations: vec!["a.pdf, page 1, chunk 0".into(), "b.pdf, page 3, chunk 4".into()],
        };
        assert_eq!(
            format_cached_answer(&cached),
            "[Cached Response]\n\nThe model reaches 92%.\n\nSources:\na.pdf, page 1, chunk 0;\nb.pdf, page 3, chunk 4"
        );
    }

    #[test]
    fn test_format_without_citations() {
        let cached = CachedAnswer {
            answer: "There is no relevant content in the PDFs you uploaded.".into(),
            ..CachedAnswer::default()
        };
        assert_eq!(
            format_cached_answer(&cached),
            "[Cached Response]\n\nThere is no relevant content in the PDFs you uploaded."
        );
    }

    #[tokio::test]
    async fn test_check_and_route() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(PartitionLayout::new(dir.path()));
        log.append_qa(&QaRecord::now(
            "Who wrote it?",
            vec![],
            "Alice.",
            vec!["p.pdf, page 1, chunk 0".into()],
            vec![],
        ))
        .await
        .unwrap();

        let cache = CacheLookup::new(Arc::new(log));

        let mut state = RequestState::new(" WHO wrote it? ");
        state.apply_all(cache.check(&state.question.clone()).await);
        assert!(state.cache_hit);
        assert!(state
            .answer_message
            .as_deref()
            .unwrap()
            .starts_with("[Cached Response]\n\nAlice."));
        assert_eq!(CacheLookup::route(&state), Stage::Done);

        let mut state = RequestState::new("Who wrote the sequel?");
        state.apply_all(cache.check(&state.question.clone()).await);
        assert!(!state.cache_hit);
        assert_eq!(CacheLookup::route(&state), Stage::Rewrite);
    }
}

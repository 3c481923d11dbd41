//! Stage machine driving one question to an answer
//!
//! Each stage reads the current `RequestState` and returns the updates to
//! apply. Routing is decided by `Stage::next` after the updates land, so the
//! only branch (cache hit or miss) is visible in one place.

use std::sync::Arc;
use std::time::Instant;

use docqa_config::constants::answers;
use docqa_config::RetrievalConfig;
use docqa_core::DocumentIndex;
use docqa_llm::LlmBackend;
use docqa_persistence::AuditLog;
use docqa_rag::{query_variants, rrf_fusion, LlmReranker, QueryRewriter, RetrievalDispatcher};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::CacheLookup;
use crate::generator::AnswerGenerator;
use crate::stage::Stage;
use crate::state::{FieldUpdate, RequestState, StateUpdate};
use crate::AgentError;

/// Shared services, built once at startup
///
/// Every handle is safe for concurrent use by many requests.
#[derive(Clone)]
pub struct PipelineServices {
    pub index: Arc<dyn DocumentIndex>,
    pub response_llm: Arc<dyn LlmBackend>,
    pub rerank_llm: Arc<dyn LlmBackend>,
    pub audit: Arc<dyn AuditLog>,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub request_id: Uuid,
    pub answer: String,
    pub cache_hit: bool,
    pub state: RequestState,
}

/// Question answering pipeline
pub struct QaPipeline {
    cache: CacheLookup,
    rewriter: QueryRewriter,
    dispatcher: RetrievalDispatcher,
    reranker: LlmReranker,
    generator: AnswerGenerator,
    config: RetrievalConfig,
}

impl QaPipeline {
    pub fn new(services: PipelineServices, config: RetrievalConfig) -> Self {
        Self {
            cache: CacheLookup::new(Arc::clone(&services.audit)),
            rewriter: QueryRewriter::new(Arc::clone(&services.response_llm)),
            dispatcher: RetrievalDispatcher::new(services.index, &config),
            reranker: LlmReranker::new(services.rerank_llm, config.final_top_k),
            generator: AnswerGenerator::new(services.response_llm, services.audit),
            config,
        }
    }

    /// Answer one question
    ///
    /// Only rewrite and retrieval failures surface as errors. Reranking and
    /// generation degrade inside their stages.
    pub async fn answer(&self, question: &str) -> Result<PipelineOutput, AgentError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("qa_request", request_id = %request_id);
        self.run(request_id, question).instrument(span).await
    }

    async fn run(&self, request_id: Uuid, question: &str) -> Result<PipelineOutput, AgentError> {
        metrics::counter!("docqa_requests_total").increment(1);

        let mut state = RequestState::new(question);
        let mut stage = Stage::default();
        tracing::info!(question = %state.question, "Processing question");

        while !stage.is_terminal() {
            let started = Instant::now();

            let updates = match self.run_stage(stage, &state).await {
                Ok(updates) => updates,
                Err(e) => {
                    metrics::counter!("docqa_pipeline_errors_total", "stage" => stage.as_str())
                        .increment(1);
                    tracing::error!(stage = %stage, error = %e, "Pipeline failed");
                    return Err(e);
                },
            };

            metrics::histogram!("docqa_stage_duration_seconds", "stage" => stage.as_str())
                .record(started.elapsed().as_secs_f64());

            state.apply_all(updates);

            let next = stage.next(&state);
            debug_assert!(stage.can_transition_to(next));
            tracing::debug!(
                from = %stage,
                to = %next,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage complete"
            );
            stage = next;
        }

        let answer = state
            .answer_message
            .clone()
            .unwrap_or_else(|| answers::NO_CONTEXT.to_string());

        Ok(PipelineOutput {
            request_id,
            answer,
            cache_hit: state.cache_hit,
            state,
        })
    }

    /// Run a single stage against the current state
    pub async fn run_stage(
        &self,
        stage: Stage,
        state: &RequestState,
    ) -> Result<Vec<StateUpdate>, AgentError> {
        match stage {
            Stage::CacheCheck => Ok(self.cache.check(&state.question).await),

            Stage::Rewrite => {
                let queries = self
                    .rewriter
                    .rewrite(&state.question)
                    .await
                    .map_err(AgentError::Rewrite)?;
                tracing::info!(queries = ?queries, "Rewrote question");

                // a fresh rewrite starts a fresh retrieval round
                Ok(vec![
                    StateUpdate::RewrittenQueries(FieldUpdate::Replace(queries)),
                    StateUpdate::RawCandidates(FieldUpdate::clear()),
                ])
            },

            Stage::Retrieve => {
                let variants = query_variants(&state.rewritten_queries, &state.question);
                let candidates = self
                    .dispatcher
                    .dispatch(&variants)
                    .await
                    .map_err(AgentError::Retrieval)?;
                tracing::info!(
                    variants = variants.len(),
                    candidates = candidates.len(),
                    "Retrieved candidates"
                );

                Ok(vec![StateUpdate::RawCandidates(FieldUpdate::Append(candidates))])
            },

            Stage::Fuse => {
                let fused = rrf_fusion(
                    &state.raw_candidates,
                    self.config.rrf_k,
                    self.config.per_call_k,
                    self.config.fusion_top_k,
                );
                tracing::debug!(
                    raw = state.raw_candidates.len(),
                    fused = fused.len(),
                    "Fused candidates"
                );

                Ok(vec![StateUpdate::FusedContext(FieldUpdate::Replace(
                    fused.into_iter().map(|f| f.chunk).collect(),
                ))])
            },

            Stage::Rerank => {
                let outcome = self.reranker.rerank(&state.question, &state.fused_context).await;
                tracing::info!(
                    selected = outcome.chunks.len(),
                    fallback = outcome.fallback,
                    "Reranked context"
                );

                Ok(vec![StateUpdate::RerankedContext(FieldUpdate::Replace(
                    outcome.chunks,
                ))])
            },

            Stage::Generate => {
                let answer = self
                    .generator
                    .generate(
                        &state.question,
                        &state.rewritten_queries,
                        &state.reranked_context,
                    )
                    .await;

                Ok(vec![StateUpdate::AnswerMessage(answer)])
            },

            Stage::Done => Ok(Vec::new()),
        }
    }
}

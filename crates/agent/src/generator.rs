//! Answer generation
//!
//! Builds a context block per reranked chunk, labelled with its chunk id,
//! and asks the response model for `{"answer": .., "citations": [..]}`.
//! The citation rules live in the prompt only; nothing here checks that
//! the returned citations match the context labels.
//!
//! Failures never reach the caller. The user gets a fixed apology and an
//! error record is written instead of the Q&A record.

use std::sync::Arc;

use docqa_config::constants::answers;
use docqa_core::Chunk;
use docqa_llm::{LlmBackend, LlmError, Message, ResponseFormat};
use docqa_persistence::{AuditLog, ErrorRecord, QaRecord};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GeneratedAnswer {
    answer: String,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug)]
enum GenerationFailure {
    Llm(LlmError),
    Parse(serde_json::Error),
}

impl GenerationFailure {
    fn error_type(&self) -> &'static str {
        match self {
            GenerationFailure::Llm(e) => e.kind(),
            GenerationFailure::Parse(_) => "JsonParseError",
        }
    }

    fn message(&self) -> String {
        match self {
            GenerationFailure::Llm(e) => e.to_string(),
            GenerationFailure::Parse(e) => e.to_string(),
        }
    }
}

/// Citation-constrained answer generator
pub struct AnswerGenerator {
    llm: Arc<dyn LlmBackend>,
    audit: Arc<dyn AuditLog>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmBackend>, audit: Arc<dyn AuditLog>) -> Self {
        Self { llm, audit }
    }

    /// Final user-facing text for the question
    ///
    /// Empty context short-circuits to "I don't know." without a model call
    /// or an audit write.
    pub async fn generate(
        &self,
        question: &str,
        rewritten_queries: &[String],
        context: &[Chunk],
    ) -> String {
        if context.is_empty() {
            tracing::info!(question = %question, "No context after reranking");
            return answers::NO_CONTEXT.to_string();
        }

        match self.call(question, context).await {
            Ok(generated) => {
                let text = format_answer(&generated.answer, &generated.citations);

                let record = QaRecord::now(
                    question,
                    rewritten_queries.to_vec(),
                    generated.answer,
                    generated.citations,
                    context.iter().map(Chunk::to_ref).collect(),
                );
                if let Err(e) = self.audit.append_qa(&record).await {
                    tracing::warn!(error = %e, "Failed to append Q&A record");
                }

                text
            },
            Err(failure) => {
                tracing::error!(
                    error_type = failure.error_type(),
                    error = %failure.message(),
                    question = %question,
                    "Answer generation failed"
                );
                metrics::counter!("docqa_generation_errors_total").increment(1);

                let record = ErrorRecord::now(failure.error_type(), failure.message(), question);
                if let Err(e) = self.audit.append_error(&record).await {
                    tracing::warn!(error = %e, "Failed to append error record");
                }

                answers::GENERATION_ERROR.to_string()
            },
        }
    }

    async fn call(
        &self,
        question: &str,
        context: &[Chunk],
    ) -> Result<GeneratedAnswer, GenerationFailure> {
        let messages = [Message::user(build_prompt(question, context))];

        let response = self
            .llm
            .generate(&messages, &ResponseFormat::JsonObject)
            .await
            .map_err(GenerationFailure::Llm)?;

        serde_json::from_str(response.text.trim()).map_err(GenerationFailure::Parse)
    }
}

/// Answer text with a trailing sources block when there are citations
fn format_answer(answer: &str, citations: &[String]) -> String {
    if citations.is_empty() {
        return answer.to_string();
    }
    format!(
        "{}\n\n{}\n{}",
        answer,
        answers::SOURCES_HEADING,
        citations.join("\n")
    )
}

/// `[Source: <chunk id>]` blocks separated by `---`
fn context_block(context: &[Chunk]) -> String {
    context
        .iter()
        .map(|chunk| {
            format!(
                "[Source: {}]\n{}\n\n---\n\n",
                chunk.source_label(),
                chunk.content.trim()
            )
        })
        .collect()
}

fn build_prompt(question: &str, context: &[Chunk]) -> String {
    format!(
        r#"Answer the question using ONLY the context below.

Task:
1. Write a concise, factual answer of 3 to 5 sentences.
2. Keep source identifiers out of the answer text.
3. Put every source you relied on into a separate citations list.

Facts:
- Every distinct fact, or group of facts, must be backed by a citation.
- A group is a set of facts that belong together and come from the same source.
- When listing several items from one source (authors, parameters, components), group them under that one source instead of citing each item.

Citations:
- Copy identifiers exactly as they appear in [Source: ...].
- List each identifier at most once.
- Never invent, shorten or reword an identifier.
- Never use knowledge from outside the context.

Special cases:
- If the context does not contain the answer, set answer to "{not_found}" and citations to [].
- If the answer needs a calculation, cite both the source of the formula and the source of the values.

Question: {question}

Context:
{context}
Respond with a JSON object of this exact shape and nothing else:
{{"answer": "3 to 5 sentence answer", "citations": ["source identifier", "..."]}}"#,
        not_found = answers::NOT_IN_CORPUS,
        question = question,
        context = context_block(context),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_llm::{FinishReason, GenerationResult};
    use docqa_persistence::{CachedAnswer, PersistenceError};
    use parking_lot::Mutex;

    enum Reply {
        Text(&'static str),
        Timeout,
    }

    struct FixedLlm {
        reply: Reply,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedLlm {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for FixedLlm {
        async fn generate(
            &self,
            messages: &[Message],
            _format: &ResponseFormat,
        ) -> Result<GenerationResult, LlmError> {
            self.prompts.lock().push(messages[0].content.clone());
            match self.reply {
                Reply::Text(text) => Ok(GenerationResult {
                    text: text.to_string(),
                    tokens: 1,
                    total_time_ms: 1,
                    finish_reason: FinishReason::Stop,
                }),
                Reply::Timeout => Err(LlmError::Timeout),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        qa: Mutex<Vec<QaRecord>>,
        errors: Mutex<Vec<ErrorRecord>>,
    }

    #[async_trait]
    impl AuditLog for RecordingAudit {
        async fn append_qa(&self, record: &QaRecord) -> Result<(), PersistenceError> {
            self.qa.lock().push(record.clone());
            Ok(())
        }

        async fn append_error(&self, record: &ErrorRecord) -> Result<(), PersistenceError> {
            self.errors.lock().push(record.clone());
            Ok(())
        }

        async fn find_answer(&self, _question: &str) -> Option<CachedAnswer> {
            None
        }
    }

    fn context() -> Vec<Chunk> {
        vec![Chunk::identified(
            "  The model achieves 92% accuracy.\n",
            "paper.pdf",
            2,
            7,
        )]
    }

    #[tokio::test]
    async fn test_success_formats_and_records() {
        let llm = FixedLlm::new(Reply::Text(
            r#"{"answer": "The model achieves 92% accuracy.", "citations": ["paper.pdf, page 2, chunk 7"]}"#,
        ));
        let audit = Arc::new(RecordingAudit::default());
        let generator = AnswerGenerator::new(llm.clone(), audit.clone());

        let text = generator
            .generate("What accuracy?", &["model accuracy".to_string()], &context())
            .await;

        assert_eq!(
            text,
            "The model achieves 92% accuracy.\n\nSources:\npaper.pdf, page 2, chunk 7"
        );

        let prompt = llm.prompts.lock()[0].clone();
        assert!(prompt.contains(
            "[Source: paper.pdf, page 2, chunk 7]\nThe model achieves 92% accuracy.\n\n---\n\n"
        ));

        let qa = audit.qa.lock();
        assert_eq!(qa.len(), 1);
        assert_eq!(qa[0].answer, "The model achieves 92% accuracy.");
        assert_eq!(qa[0].rewritten_queries, vec!["model accuracy"]);
        assert_eq!(qa[0].reranked_context[0].chunk_id, "paper.pdf, page 2, chunk 7");
        assert!(audit.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn test_no_citations_means_no_sources_block() {
        let llm = FixedLlm::new(Reply::Text(
            r#"{"answer": "There is no relevant content in the PDFs you uploaded.", "citations": []}"#,
        ));
        let generator = AnswerGenerator::new(llm, Arc::new(RecordingAudit::default()));

        let text = generator.generate("q", &[], &context()).await;
        assert_eq!(text, answers::NOT_IN_CORPUS);
    }

    #[tokio::test]
    async fn test_empty_context_skips_llm() {
        let llm = FixedLlm::new(Reply::Text("{}"));
        let audit = Arc::new(RecordingAudit::default());
        let generator = AnswerGenerator::new(llm.clone(), audit.clone());

        assert_eq!(generator.generate("q", &[], &[]).await, "I don't know.");
        assert!(llm.prompts.lock().is_empty());
        assert!(audit.qa.lock().is_empty());
        assert!(audit.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn test_llm_error_writes_error_record() {
        let llm = FixedLlm::new(Reply::Timeout);
        let audit = Arc::new(RecordingAudit::default());
        let generator = AnswerGenerator::new(llm, audit.clone());

        let text = generator.generate("What accuracy?", &[], &context()).await;
        assert_eq!(text, "I don't know. (Error during answer generation)");

        let errors = audit.errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, "TimeoutError");
        assert_eq!(errors[0].question, "What accuracy?");
        assert!(audit.qa.lock().is_empty());
    }

    #[tokio::test]
    async fn test_bad_json_writes_error_record() {
        let llm = FixedLlm::new(Reply::Text("The answer is 92%."));
        let audit = Arc::new(RecordingAudit::default());
        let generator = AnswerGenerator::new(llm, audit.clone());

        let text = generator.generate("q", &[], &context()).await;
        assert_eq!(text, answers::GENERATION_ERROR);
        assert_eq!(audit.errors.lock()[0].error_type, "JsonParseError");
        assert!(audit.qa.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_answer_field_is_a_parse_error() {
        let llm = FixedLlm::new(Reply::Text(r#"{"citations": ["x"]}"#));
        let audit = Arc::new(RecordingAudit::default());
        let generator = AnswerGenerator::new(llm, audit.clone());

        assert_eq!(
            generator.generate("q", &[], &context()).await,
            answers::GENERATION_ERROR
        );
        assert_eq!(audit.errors.lock().len(), 1);
    }

    #[test]
    fn test_unlabelled_chunk_uses_unknown_source() {
        let block = context_block(&[Chunk::new("text")]);
        assert_eq!(block, "[Source: Unknown]\ntext\n\n---\n\n");
    }
}

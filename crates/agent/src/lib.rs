//! Question answering pipeline
//!
//! Features:
//! - Explicit stage machine: cache check, rewrite, retrieve, fuse, rerank, generate
//! - Typed per-request state with replace/append field updates
//! - Cache lookup over the audit log with a single routing branch
//! - Citation-constrained answer generation with audit and error records
//! - Services injected as shared handles built once at startup

pub mod cache;
pub mod generator;
pub mod pipeline;
pub mod stage;
pub mod state;

pub use cache::{format_cached_answer, CacheLookup};
pub use generator::AnswerGenerator;
pub use pipeline::{PipelineOutput, PipelineServices, QaPipeline};
pub use stage::Stage;
pub use state::{FieldUpdate, RequestState, StateUpdate};

use docqa_rag::RagError;
use thiserror::Error;

/// Errors that end a request without an answer
///
/// Every other failure in the pipeline is recovered inside its stage.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Query rewrite failed: {0}")]
    Rewrite(#[source] RagError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] RagError),
}

impl AgentError {
    /// Stage the error came from
    pub fn stage(&self) -> Stage {
        match self {
            AgentError::Rewrite(_) => Stage::Rewrite,
            AgentError::Retrieval(_) => Stage::Retrieve,
        }
    }
}

impl From<AgentError> for docqa_core::Error {
    fn from(err: AgentError) -> Self {
        docqa_core::Error::Index(err.to_string())
    }
}

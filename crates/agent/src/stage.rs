//! Pipeline stages and their transition table

use serde::{Deserialize, Serialize};

use crate::state::RequestState;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Look the question up in the audit log
    #[default]
    CacheCheck,
    /// Expand the question into search queries
    Rewrite,
    /// Fan out to both retrieval backends
    Retrieve,
    /// Reciprocal rank fusion
    Fuse,
    /// LLM selection of the final context
    Rerank,
    /// Answer synthesis and audit write
    Generate,
    /// Terminal
    Done,
}

impl Stage {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CacheCheck => "cache_check",
            Stage::Rewrite => "rewrite",
            Stage::Retrieve => "retrieve",
            Stage::Fuse => "fuse",
            Stage::Rerank => "rerank",
            Stage::Generate => "generate",
            Stage::Done => "done",
        }
    }

    /// Stages reachable from this one
    pub fn valid_transitions(&self) -> &'static [Stage] {
        match self {
            Stage::CacheCheck => &[Stage::Done, Stage::Rewrite],
            Stage::Rewrite => &[Stage::Retrieve],
            Stage::Retrieve => &[Stage::Fuse],
            Stage::Fuse => &[Stage::Rerank],
            Stage::Rerank => &[Stage::Generate],
            Stage::Generate => &[Stage::Done],
            Stage::Done => &[],
        }
    }

    pub fn can_transition_to(&self, target: Stage) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Next stage given the state after this one ran
    ///
    /// The cache check is the only branch: a hit ends the request.
    pub fn next(&self, state: &RequestState) -> Stage {
        match self {
            Stage::CacheCheck if state.cache_hit => Stage::Done,
            Stage::CacheCheck => Stage::Rewrite,
            Stage::Rewrite => Stage::Retrieve,
            Stage::Retrieve => Stage::Fuse,
            Stage::Fuse => Stage::Rerank,
            Stage::Rerank => Stage::Generate,
            Stage::Generate | Stage::Done => Stage::Done,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

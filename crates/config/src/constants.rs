//! Centralized constants for the document QA service
//!
//! Single source of truth for default endpoints, pipeline sizes and the
//! fixed user-facing strings.

/// Service endpoints
pub mod endpoints {
    /// Ollama endpoint (LLM and embeddings)
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Qdrant vector store endpoint
    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6334";

    /// OpenAI API endpoint
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";

    /// Groq OpenAI-compatible endpoint
    pub const GROQ_DEFAULT: &str = "https://api.groq.com/openai/v1";

    /// Gemini OpenAI-compatible endpoint
    pub const GOOGLE_DEFAULT: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

    /// Anthropic API endpoint
    pub const ANTHROPIC_DEFAULT: &str = "https://api.anthropic.com";
}

/// Timeouts (seconds)
pub mod timeouts {
    /// LLM request timeout
    pub const LLM_REQUEST_SECS: u64 = 60;

    /// Embedding / index request timeout
    pub const INDEX_REQUEST_SECS: u64 = 30;
}

/// Retrieval and ranking sizes
pub mod retrieval {
    /// Results requested per (query variant, backend) call
    pub const PER_CALL_K: usize = 5;

    /// Reciprocal rank fusion constant
    pub const RRF_K: u32 = 60;

    /// Candidates kept after fusion
    pub const FUSION_TOP_K: usize = 15;

    /// Chunks kept after reranking
    pub const FINAL_TOP_K: usize = 5;

    /// Number of rewritten query variants requested
    pub const REWRITE_COUNT: usize = 3;

    /// Upper bound on simultaneous index calls per request
    pub const MAX_CONCURRENT_SEARCHES: usize = 8;
}

/// Embedding defaults
pub mod embedding {
    /// Embedding model served by Ollama
    pub const MODEL: &str = "jeffh/intfloat-multilingual-e5-base:f16";

    /// E5 query instruction prefix
    pub const QUERY_PREFIX: &str = "query: ";

    /// Vector dimension of the default model
    pub const DIMENSION: usize = 768;
}

/// LLM provider names and per-provider default models
pub mod providers {
    pub const OLLAMA: &str = "ollama";
    pub const OPENAI: &str = "openai";
    pub const GROQ: &str = "groq";
    pub const ANTHROPIC: &str = "anthropic";
    pub const GOOGLE: &str = "google";

    pub const SUPPORTED: &[&str] = &[OLLAMA, OPENAI, GROQ, ANTHROPIC, GOOGLE];

    /// Default (response model, rerank model) per provider
    pub fn default_models(provider: &str) -> Option<(&'static str, &'static str)> {
        match provider {
            GROQ => Some((
                "openai/gpt-oss-120b",
                "meta-llama/llama-4-scout-17b-16e-instruct",
            )),
            OPENAI => Some(("gpt-4o", "gpt-4o-mini")),
            ANTHROPIC => Some(("claude-3-5-sonnet-20241022", "claude-3-5-haiku-20241022")),
            GOOGLE => Some(("gemini-2.0-flash-exp", "gemini-2.0-flash-exp")),
            OLLAMA => Some(("qwen2.5:7b", "qwen2.5:7b")),
            _ => None,
        }
    }

    /// Conventional API key environment variable per provider
    pub fn api_key_env(provider: &str) -> Option<&'static str> {
        match provider {
            GROQ => Some("GROQ_API_KEY"),
            OPENAI => Some("OPENAI_API_KEY"),
            ANTHROPIC => Some("ANTHROPIC_API_KEY"),
            GOOGLE => Some("GOOGLE_API_KEY"),
            _ => None,
        }
    }
}

/// Fixed user-facing answer strings
pub mod answers {
    /// Marker prepended to answers served from the audit log
    pub const CACHED_PREFIX: &str = "[Cached Response]";

    /// Returned when reranking leaves no context
    pub const NO_CONTEXT: &str = "I don't know.";

    /// Returned when answer generation fails
    pub const GENERATION_ERROR: &str = "I don't know. (Error during answer generation)";

    /// Answer the model is instructed to give when context lacks the answer
    pub const NOT_IN_CORPUS: &str = "There is no relevant content in the PDFs you uploaded.";

    /// Heading of the citation block
    pub const SOURCES_HEADING: &str = "Sources:";
}

/// Audit log layout
pub mod audit {
    /// Default log directory
    pub const LOG_DIR: &str = "logs";

    /// Q&A partition prefix
    pub const QA_PREFIX: &str = "qa_log";

    /// Error partition prefix
    pub const ERROR_PREFIX: &str = "error_log";

    /// Partition file extension
    pub const EXTENSION: &str = "jsonl";
}

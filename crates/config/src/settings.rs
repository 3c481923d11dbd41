//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{audit, embedding, endpoints, providers, retrieval, timeouts};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider and model selection
    #[serde(default)]
    pub llm: LlmSettings,

    /// Retrieval, fusion and rerank sizes
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Document index connections
    #[serde(default)]
    pub index: IndexConfig,

    /// Audit log / answer cache location
    #[serde(default)]
    pub audit: AuditConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_retrieval()?;
        self.validate_audit()?;

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if !providers::SUPPORTED.contains(&llm.provider.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "llm.provider".to_string(),
                message: format!(
                    "Unsupported provider '{}', expected one of {:?}",
                    llm.provider,
                    providers::SUPPORTED
                ),
            });
        }

        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", llm.temperature),
            });
        }

        if llm.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.timeout_secs".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    /// Validate retrieval sizes
    pub fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;

        for (field, value) in [
            ("retrieval.per_call_k", r.per_call_k),
            ("retrieval.fusion_top_k", r.fusion_top_k),
            ("retrieval.final_top_k", r.final_top_k),
            ("retrieval.max_concurrent_searches", r.max_concurrent_searches),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Must be at least 1".to_string(),
                });
            }
        }

        if r.rrf_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.rrf_k".to_string(),
                message: "Must be positive".to_string(),
            });
        }

        if r.final_top_k > r.fusion_top_k {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.final_top_k".to_string(),
                message: format!(
                    "Cannot be larger than fusion_top_k ({})",
                    r.fusion_top_k
                ),
            });
        }

        Ok(())
    }

    fn validate_audit(&self) -> Result<(), ConfigError> {
        if self.audit.log_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "audit.log_dir".to_string(),
                message: "Log directory cannot be empty".to_string(),
            });
        }

        if self.audit.qa_prefix == self.audit.error_prefix {
            return Err(ConfigError::InvalidValue {
                field: "audit.error_prefix".to_string(),
                message: "Error partitions must not share the Q&A prefix".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty means permissive
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// LLM provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider name (ollama, openai, groq, anthropic, google)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model used for query rewriting and answer generation
    #[serde(default)]
    pub response_model: Option<String>,

    /// Model used for reranking
    #[serde(default)]
    pub rerank_model: Option<String>,

    /// Endpoint override (provider default when unset)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key (provider's conventional env var when unset)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    std::env::var("MODEL_PROVIDER")
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|_| providers::GROQ.to_string())
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout() -> u64 {
    timeouts::LLM_REQUEST_SECS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            response_model: None,
            rerank_model: None,
            endpoint: None,
            api_key: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmSettings {
    /// Resolved response model name
    pub fn response_model(&self) -> String {
        self.response_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| providers::default_models(&self.provider).map(|(r, _)| r.to_string()))
            .unwrap_or_default()
    }

    /// Resolved rerank model name
    pub fn rerank_model(&self) -> String {
        self.rerank_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| providers::default_models(&self.provider).map(|(_, r)| r.to_string()))
            .unwrap_or_default()
    }

    /// Resolved API key, falling back to the provider's env var
    pub fn api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            providers::api_key_env(&self.provider).and_then(|var| std::env::var(var).ok())
        })
    }

    /// Resolved endpoint
    pub fn endpoint(&self) -> String {
        if let Some(ref endpoint) = self.endpoint {
            return endpoint.clone();
        }
        match self.provider.as_str() {
            providers::OPENAI => endpoints::OPENAI_DEFAULT,
            providers::GROQ => endpoints::GROQ_DEFAULT,
            providers::GOOGLE => endpoints::GOOGLE_DEFAULT,
            providers::ANTHROPIC => endpoints::ANTHROPIC_DEFAULT,
            _ => endpoints::OLLAMA_DEFAULT,
        }
        .to_string()
    }
}

/// Retrieval pipeline sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results per (query variant, backend) call; also the positional rank period in fusion
    #[serde(default = "default_per_call_k")]
    pub per_call_k: usize,

    /// RRF constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Candidates kept after fusion
    #[serde(default = "default_fusion_top_k")]
    pub fusion_top_k: usize,

    /// Chunks kept after reranking
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,

    /// Simultaneous index calls per request
    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: usize,
}

fn default_per_call_k() -> usize {
    retrieval::PER_CALL_K
}
fn default_rrf_k() -> u32 {
    retrieval::RRF_K
}
fn default_fusion_top_k() -> usize {
    retrieval::FUSION_TOP_K
}
fn default_final_top_k() -> usize {
    retrieval::FINAL_TOP_K
}
fn default_max_concurrent_searches() -> usize {
    retrieval::MAX_CONCURRENT_SEARCHES
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_call_k: default_per_call_k(),
            rrf_k: default_rrf_k(),
            fusion_top_k: default_fusion_top_k(),
            final_top_k: default_final_top_k(),
            max_concurrent_searches: default_max_concurrent_searches(),
        }
    }
}

/// Document index connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// Tantivy index directory (RAM index when unset)
    #[serde(default = "default_sparse_index_path")]
    pub sparse_index_path: Option<String>,

    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Prefix applied to queries before embedding
    #[serde(default = "default_query_prefix")]
    pub query_prefix: String,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_collection() -> String {
    "rag_demo".to_string()
}
fn default_sparse_index_path() -> Option<String> {
    Some("data/vector_store/bm25".to_string())
}
fn default_embedding_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}
fn default_embedding_model() -> String {
    embedding::MODEL.to_string()
}
fn default_embedding_dim() -> usize {
    embedding::DIMENSION
}
fn default_query_prefix() -> String {
    embedding::QUERY_PREFIX.to_string()
}
fn default_index_timeout() -> u64 {
    timeouts::INDEX_REQUEST_SECS
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_endpoint: default_qdrant_endpoint(),
            collection: default_collection(),
            qdrant_api_key: None,
            sparse_index_path: default_sparse_index_path(),
            embedding_endpoint: default_embedding_endpoint(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            query_prefix: default_query_prefix(),
            timeout_secs: default_index_timeout(),
        }
    }
}

/// Audit log / answer cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_qa_prefix")]
    pub qa_prefix: String,

    #[serde(default = "default_error_prefix")]
    pub error_prefix: String,
}

fn default_log_dir() -> String {
    audit::LOG_DIR.to_string()
}
fn default_qa_prefix() -> String {
    audit::QA_PREFIX.to_string()
}
fn default_error_prefix() -> String {
    audit::ERROR_PREFIX.to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            qa_prefix: default_qa_prefix(),
            error_prefix: default_error_prefix(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/default`, `config/{env}` and `DOCQA__*` variables
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(config_dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder =
        builder.add_source(File::with_name(&format!("{}/default", config_dir)).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder.add_source(
            File::with_name(&format!("{}/{}", config_dir, env_name)).required(false),
        );
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("DOCQA")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

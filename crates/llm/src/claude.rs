//! Claude backend (Anthropic Messages API)
//!
//! The Messages API has no JSON mode, so the two structured formats are
//! expressed natively:
//! - `JsonObject`: the assistant turn is prefilled with `{` so the model
//!   continues a JSON object; the brace is restored on the returned text.
//! - `JsonSchema`: a single tool whose `input_schema` is the schema, forced
//!   with `tool_choice`; the tool input is returned as the JSON text.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::{
    check_status, elapsed_ms, http_client, FinishReason, GenerationResult, LlmBackend,
};
use crate::prompt::{Message, ResponseFormat, Role};
use crate::LlmError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const JSON_PREFILL: &str = "{";

/// Configuration for Claude backend
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// API key (from ANTHROPIC_API_KEY or direct)
    pub api_key: String,
    /// Model ID
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature (0.0 - 1.0)
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
    /// API endpoint (for testing or proxy)
    pub endpoint: String,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(60),
            endpoint: "https://api.anthropic.com".to_string(),
        }
    }
}

impl ClaudeConfig {
    /// Create config with API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Claude backend
pub struct ClaudeBackend {
    config: ClaudeConfig,
    client: Client,
}

impl ClaudeBackend {
    /// Create a new Claude backend
    pub fn new(config: ClaudeConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(config.timeout)?,
            config,
        })
    }

    fn build_request(&self, messages: &[Message], format: &ResponseFormat) -> ClaudeRequest {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut claude_messages: Vec<ClaudeMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ClaudeMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        let (tools, tool_choice) = match format {
            ResponseFormat::JsonSchema { name, schema } => (
                Some(vec![ClaudeTool {
                    name: name.clone(),
                    description: "Record the structured result.".to_string(),
                    input_schema: schema.clone(),
                }]),
                Some(ClaudeToolChoice {
                    kind: "tool".to_string(),
                    name: name.clone(),
                }),
            ),
            ResponseFormat::JsonObject => {
                claude_messages.push(ClaudeMessage {
                    role: Role::Assistant.to_string(),
                    content: JSON_PREFILL.to_string(),
                });
                (None, None)
            },
            ResponseFormat::Text => (None, None),
        };

        ClaudeRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: claude_messages,
            system: if system.is_empty() { None } else { Some(system) },
            tools,
            tool_choice,
            temperature: Some(self.config.temperature),
        }
    }

    /// Collapse the response blocks into the text the caller expects
    fn extract_text(
        response: ClaudeApiResponse,
        format: &ResponseFormat,
    ) -> Result<String, LlmError> {
        match format {
            ResponseFormat::JsonSchema { name, .. } => response
                .content
                .into_iter()
                .find_map(|block| match block {
                    ClaudeContentBlock::ToolUse { name: n, input, .. } if &n == name => {
                        Some(input)
                    },
                    _ => None,
                })
                .map(|input| input.to_string())
                .ok_or_else(|| {
                    LlmError::InvalidResponse(format!("No '{}' tool_use block in response", name))
                }),
            ResponseFormat::JsonObject | ResponseFormat::Text => {
                let mut text = String::new();
                if matches!(format, ResponseFormat::JsonObject) {
                    text.push_str(JSON_PREFILL);
                }
                for block in response.content {
                    if let ClaudeContentBlock::Text { text: t } = block {
                        text.push_str(&t);
                    }
                }
                Ok(text)
            },
        }
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn generate(
        &self,
        messages: &[Message],
        format: &ResponseFormat,
    ) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages, format);

        let response = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.config.endpoint.trim_end_matches('/')
            ))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response: ClaudeApiResponse = check_status(response, &self.config.model)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let tokens = response.usage.output_tokens;
        let finish_reason = match response.stop_reason {
            Some(ClaudeStopReason::MaxTokens) => FinishReason::Length,
            _ => FinishReason::Stop,
        };
        let text = Self::extract_text(response, format)?;

        Ok(GenerationResult {
            text,
            tokens,
            total_time_ms: elapsed_ms(start),
            finish_reason,
        })
    }

    async fn is_available(&self) -> bool {
        // Minimal health check
        !self.config.api_key.is_empty()
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// Claude API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ClaudeToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ClaudeToolChoice {
    #[serde(rename = "type")]
    kind: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    stop_reason: Option<ClaudeStopReason>,
    usage: ClaudeUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClaudeStopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    output_tokens: usize,
}

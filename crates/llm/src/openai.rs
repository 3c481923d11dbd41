//! OpenAI-compatible chat completions backend
//!
//! Groq and Gemini expose the same API under a different base URL, so one
//! backend serves all three. Structured output uses `response_format`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_config::constants::{endpoints, timeouts};

use crate::backend::{
    check_status, elapsed_ms, http_client, FinishReason, GenerationResult, LlmBackend,
};
use crate::prompt::{Message, ResponseFormat};
use crate::LlmError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OPENAI_DEFAULT.to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(timeouts::LLM_REQUEST_SECS),
        }
    }
}

impl OpenAIConfig {
    /// Any OpenAI-compatible endpoint
    pub fn compatible(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }
}

pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
    headers: HeaderMap,
}

impl OpenAIBackend {
    /// Remote endpoints need a key; localhost servers (vLLM, llama.cpp) do not
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        let local = config.endpoint.starts_with("http://localhost")
            || config.endpoint.starts_with("http://127.0.0.1");
        if config.api_key.is_empty() && !local {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| LlmError::Configuration(format!("Invalid API key: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(Self {
            client: http_client(config.timeout)?,
            config,
            headers,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn chat_request(&self, messages: &[Message], format: &ResponseFormat) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: response_format_body(format),
        }
    }
}

/// `response_format` body for the chat completions API
fn response_format_body(format: &ResponseFormat) -> Option<serde_json::Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonObject => Some(serde_json::json!({ "type": "json_object" })),
        ResponseFormat::JsonSchema { name, schema } => Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "schema": schema,
                "strict": true,
            }
        })),
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(
        &self,
        messages: &[Message],
        format: &ResponseFormat,
    ) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.url("chat/completions"))
            .headers(self.headers.clone())
            .json(&self.chat_request(messages, format))
            .send()
            .await?;

        let completion: ChatCompletion = check_status(response, &self.config.model)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let tokens = completion.usage.map(|u| u.completion_tokens).unwrap_or(0);
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(LlmError::Generation(format!("Model refused: {}", refusal)));
        }

        let text = choice
            .message
            .content
            .ok_or_else(|| LlmError::InvalidResponse("Empty message content".to_string()))?;

        Ok(GenerationResult {
            text,
            tokens,
            total_time_ms: elapsed_ms(start),
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                Some("content_filter") => FinishReason::Error,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.url("models"))
            .headers(self.headers.clone())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    completion_tokens: usize,
}

//! Ollama backend (`/api/chat`)
//!
//! `format` takes either the string `"json"` or a full JSON schema, which
//! maps one-to-one onto `ResponseFormat`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_config::constants::{endpoints, timeouts};

use crate::backend::{
    check_status, elapsed_ms, http_client, FinishReason, GenerationResult, LlmBackend,
};
use crate::prompt::{Message, ResponseFormat};
use crate::LlmError;

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model: String,
    pub endpoint: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
    /// Keep model loaded between calls ("5m", "1h", "-1")
    pub keep_alive: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "qwen2.5:7b".to_string(),
            endpoint: endpoints::OLLAMA_DEFAULT.to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(timeouts::LLM_REQUEST_SECS),
            keep_alive: "5m".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config.timeout)?,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn chat_request(&self, messages: &[Message], format: &ResponseFormat) -> ChatRequest {
        let format = match format {
            ResponseFormat::Text => None,
            ResponseFormat::JsonObject => Some(serde_json::json!("json")),
            ResponseFormat::JsonSchema { schema, .. } => Some(schema.clone()),
        };

        ChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(ChatMessage::from).collect(),
            stream: false,
            format,
            options: ChatOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens as i32,
            },
            keep_alive: self.config.keep_alive.clone(),
            think: false,
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(
        &self,
        messages: &[Message],
        format: &ResponseFormat,
    ) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.url("chat"))
            .json(&self.chat_request(messages, format))
            .send()
            .await?;

        let reply: ChatResponse = check_status(response, &self.config.model)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(GenerationResult {
            text: reply.message.content,
            tokens: reply.eval_count.unwrap_or(0) as usize,
            total_time_ms: elapsed_ms(start),
            finish_reason: match reply.done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ if !reply.done => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn is_available(&self) -> bool {
        match self.client.get(self.url("tags")).send().await {
            Ok(r) => r.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// "json" or a JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    options: ChatOptions,
    keep_alive: String,
    /// Reasoning models (qwen3, deepseek-r1) would otherwise emit thinking text
    think: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OllamaBackend {
        OllamaBackend::new(OllamaConfig::default()).unwrap()
    }

    #[test]
    fn test_message_conversion() {
        let msg: ChatMessage = (&Message::user("Hello")).into();
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_format_field() {
        let messages = [Message::user("hi")];
        let body = |format: &ResponseFormat| {
            serde_json::to_value(backend().chat_request(&messages, format)).unwrap()
        };

        assert!(body(&ResponseFormat::Text).get("format").is_none());
        assert_eq!(body(&ResponseFormat::JsonObject)["format"], "json");

        let schema = serde_json::json!({"type": "object"});
        let constrained = body(&ResponseFormat::json_schema("s", schema.clone()));
        assert_eq!(constrained["format"], schema);
        assert_eq!(constrained["think"], false);
        assert_eq!(constrained["stream"], false);
    }

    #[test]
    fn test_response_parsing() {
        let reply: ChatResponse = serde_json::from_str(
            r#"{"message": {"role": "assistant", "content": "{\"queries\": []}"},
                "done": true, "done_reason": "length", "eval_count": 12}"#,
        )
        .unwrap();
        assert_eq!(reply.message.content, r#"{"queries": []}"#);
        assert_eq!(reply.done_reason.as_deref(), Some("length"));
        assert_eq!(reply.eval_count, Some(12));
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend = OllamaBackend::new(OllamaConfig {
            endpoint: "http://gpu-box:11434/".to_string(),
            ..OllamaConfig::default()
        })
        .unwrap();
        assert_eq!(backend.url("chat"), "http://gpu-box:11434/api/chat");
    }
}

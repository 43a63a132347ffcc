//! Completion provider seam and the OpenAI-compatible implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use concierge_core::config::LlmConfig;
use concierge_core::domain::conversation::{ConversationTurn, Role};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self { role: turn.role, content: turn.content.clone() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response could not be decoded: {0}")]
    Decode(String),
    #[error("completion provider returned empty content")]
    EmptyCompletion,
    #[error("completion provider is not configured: {0}")]
    NotConfigured(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One completion string for the ordered message list. No retries.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::NotConfigured("llm.api_key is missing".to_string()))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: ChatCompletionResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        extract_content(payload)
    }
}

fn extract_content(payload: ChatCompletionResponse) -> Result<String, LlmError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(LlmError::EmptyCompletion)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_content, ChatCompletionResponse, ChatMessage, LlmError};

    fn decode(value: serde_json::Value) -> ChatCompletionResponse {
        serde_json::from_value(value).expect("response shape")
    }

    #[test]
    fn first_choice_content_is_trimmed() {
        let payload = decode(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Hello!\n" } }]
        }));
        assert_eq!(extract_content(payload).expect("content"), "Hello!");
    }

    #[test]
    fn missing_or_blank_content_is_an_error() {
        let blank = decode(json!({ "choices": [{ "message": { "content": "   " } }] }));
        assert!(matches!(extract_content(blank), Err(LlmError::EmptyCompletion)));

        let none = decode(json!({ "choices": [] }));
        assert!(matches!(extract_content(none), Err(LlmError::EmptyCompletion)));
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let value = serde_json::to_value(ChatMessage::system("be brief")).expect("serialize");
        assert_eq!(value, json!({ "role": "system", "content": "be brief" }));
    }
}

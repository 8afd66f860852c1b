//! Ollama chat backend (`/api/chat`), typically a local model.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{AiBackend, Prompt};
use crate::error::{BackendError, BackendResult};

/// Connection settings for an Ollama endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OllamaConfig {
    /// Ollama HTTP API base URL.
    #[serde(default = "default_host")]
    pub host: String,
    /// Model to use for inference.
    #[serde(default = "default_model")]
    pub model: String,
    /// Ask Ollama to constrain output to JSON.
    #[serde(default)]
    pub json_mode: bool,
}

fn default_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "phi3:mini".into()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            json_mode: false,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Ollama chat API response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Backend speaking the Ollama chat API.
pub struct OllamaBackend {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AiBackend for OllamaBackend {
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> BackendResult<String> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            format: self.config.json_mode.then_some("json"),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "ollama returned non-200");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("ollama response body: {e}")))?;

        let content = chat
            .message
            .map(|m| m.content)
            .ok_or_else(|| BackendError::Malformed("ollama response has no message".into()))?;

        if content.trim().is_empty() {
            return Err(BackendError::Malformed("ollama returned empty content".into()));
        }
        Ok(content)
    }

    fn kind(&self) -> &str {
        "ollama"
    }
}

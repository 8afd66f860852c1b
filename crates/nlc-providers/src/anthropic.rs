//! Anthropic Messages API backend (`/v1/messages`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{AiBackend, Prompt};
use crate::error::{BackendError, BackendResult};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_model() -> String {
    "claude-3-5-haiku-latest".into()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicBackend {
    client: reqwest::Client,
    config: AnthropicConfig,
    api_key: String,
}

impl AnthropicBackend {
    pub fn with_key(config: AnthropicConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    pub fn from_env(config: AnthropicConfig) -> anyhow::Result<Self> {
        let key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("environment variable {} not set", config.api_key_env))?;
        Self::with_key(config, key)
    }
}

#[async_trait]
impl AiBackend for AnthropicBackend {
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> BackendResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: prompt.system.as_deref(),
            messages: [UserMessage {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, model = %self.config.model, "anthropic returned non-200");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("anthropic response body: {e}")))?;

        // Concatenate text blocks; tool_use and other block types are ignored.
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(BackendError::Malformed(
                "anthropic response has no text content".into(),
            ));
        }
        Ok(text)
    }

    fn kind(&self) -> &str {
        "anthropic"
    }
}

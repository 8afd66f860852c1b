//! OpenAI-compatible chat completions backend (`/v1/chat/completions`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{AiBackend, Prompt};
use crate::error::{BackendError, BackendResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiBackend {
    client: reqwest::Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiBackend {
    /// Build with an explicit key (tests, or keys from a credential store).
    pub fn with_key(config: OpenAiConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Build reading the key from `config.api_key_env`.
    pub fn from_env(config: OpenAiConfig) -> anyhow::Result<Self> {
        let key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("environment variable {} not set", config.api_key_env))?;
        Self::with_key(config, key)
    }
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> BackendResult<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

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
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, model = %self.config.model, "openai returned non-200");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("openai response body: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| BackendError::Malformed("openai response has no content".into()))
    }

    fn kind(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> OpenAiBackend {
        OpenAiBackend::with_key(
            OpenAiConfig {
                base_url: server.uri(),
                ..OpenAiConfig::default()
            },
            "sk-test",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn complete_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "Use a boolean union."}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = backend_for(&server)
            .complete(&Prompt::user("how do I merge two solids?"), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(text, "Use a boolean union.");
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .complete(&Prompt::user("hi"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[tokio::test]
    async fn unauthorized_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .complete(&Prompt::user("hi"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 401, .. }));
    }

    #[test]
    fn from_env_requires_key() {
        let config = OpenAiConfig {
            api_key_env: "NLC_TEST_UNSET_OPENAI_KEY".into(),
            ..OpenAiConfig::default()
        };
        assert!(OpenAiBackend::from_env(config).is_err());
    }
}

//! AWS Bedrock backend using the model-agnostic Converse API.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, Message, SystemContentBlock,
};
use serde::Deserialize;

use crate::backend::{AiBackend, Prompt};
use crate::error::{BackendError, BackendResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BedrockConfig {
    /// Bedrock model ID (e.g., "us.amazon.nova-lite-v1:0").
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Region override; the default AWS provider chain is used when unset.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_model_id() -> String {
    "us.amazon.nova-lite-v1:0".into()
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            region: None,
        }
    }
}

pub struct BedrockBackend {
    client: BedrockClient,
    config: BedrockConfig,
}

impl BedrockBackend {
    /// Create a backend with a pre-built Bedrock client.
    pub fn new(client: BedrockClient, config: BedrockConfig) -> Self {
        Self { client, config }
    }

    /// Build a client from the default AWS config chain.
    pub async fn from_env(config: BedrockConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let aws_config = loader.load().await;
        Self::new(BedrockClient::new(&aws_config), config)
    }

    async fn call_converse(&self, prompt: &Prompt) -> BackendResult<String> {
        let user_message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt.user.clone()))
            .build()
            .map_err(|e| BackendError::Malformed(format!("failed to build message: {e}")))?;

        let mut request = self
            .client
            .converse()
            .model_id(&self.config.model_id)
            .messages(user_message);
        if let Some(system) = &prompt.system {
            request = request.system(SystemContentBlock::Text(system.clone()));
        }

        let response = request.send().await.map_err(|e| {
            let status = e.raw_response().map(|r| r.status().as_u16());
            match status {
                Some(status) => BackendError::Status {
                    status,
                    body: e.to_string(),
                },
                None => BackendError::Transport(format!("bedrock converse error: {e}")),
            }
        })?;

        let output = response
            .output()
            .ok_or_else(|| BackendError::Malformed("no output in bedrock response".into()))?;

        let text = match output {
            ConverseOutput::Message(msg) => msg.content().iter().find_map(|block| {
                if let ContentBlock::Text(t) = block {
                    Some(t.clone())
                } else {
                    None
                }
            }),
            _ => None,
        };

        text.filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BackendError::Malformed("bedrock response has no text".into()))
    }
}

#[async_trait]
impl AiBackend for BedrockBackend {
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> BackendResult<String> {
        match tokio::time::timeout(timeout, self.call_converse(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    model_id = %self.config.model_id,
                    "bedrock inference timed out"
                );
                Err(BackendError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn kind(&self) -> &str {
        "bedrock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = BedrockConfig::default();
        assert_eq!(config.model_id, "us.amazon.nova-lite-v1:0");
        assert!(config.region.is_none());
    }

    #[test]
    fn config_from_toml() {
        let config: BedrockConfig = toml::from_str(
            r#"
model_id = "anthropic.claude-3-haiku-20240307-v1:0"
region = "eu-west-1"
"#,
        )
        .unwrap();
        assert_eq!(config.model_id, "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    }
}

//! Provider configuration and router construction.
//!
//! ```toml
//! cache_ttl_secs = 300
//! cooldown_secs = 30
//!
//! [[provider]]
//! id = "local"
//! priority = 1
//! kind = "ollama"
//! model = "phi3:mini"
//!
//! [[provider]]
//! id = "cloud"
//! priority = 2
//! kind = "anthropic"
//! api_key_env = "ANTHROPIC_API_KEY"
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::anthropic::{AnthropicBackend, AnthropicConfig};
use crate::backend::AiBackend;
use crate::bedrock::{BedrockBackend, BedrockConfig};
use crate::mock::ScriptedBackend;
use crate::ollama::{OllamaBackend, OllamaConfig};
use crate::openai::{OpenAiBackend, OpenAiConfig};
use crate::router::{ProviderRouter, RouterSettings};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default, rename = "provider")]
    pub entries: Vec<ProviderEntry>,
}

fn default_true() -> bool {
    true
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_cooldown_secs() -> u64 {
    30
}
fn default_call_timeout_secs() -> u64 {
    5
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            cooldown_secs: default_cooldown_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            entries: Vec::new(),
        }
    }
}

impl ProvidersConfig {
    pub fn settings(&self) -> RouterSettings {
        RouterSettings {
            timeout: Duration::from_secs(self.call_timeout_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            cache_enabled: self.cache_enabled,
        }
    }
}

/// One `[[provider]]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    /// 1 is tried first.
    pub priority: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub backend: BackendConfig,
}

/// Backend selection, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Ollama(OllamaConfig),
    #[serde(rename = "openai")]
    OpenAi(OpenAiConfig),
    Anthropic(AnthropicConfig),
    Bedrock(BedrockConfig),
    /// Fixed reply; for demos and offline runs.
    Scripted { reply: String },
}

impl BackendConfig {
    async fn build(&self) -> anyhow::Result<Arc<dyn AiBackend>> {
        Ok(match self {
            Self::Ollama(c) => Arc::new(OllamaBackend::new(c.clone())?),
            Self::OpenAi(c) => Arc::new(OpenAiBackend::from_env(c.clone())?),
            Self::Anthropic(c) => Arc::new(AnthropicBackend::from_env(c.clone())?),
            Self::Bedrock(c) => Arc::new(BedrockBackend::from_env(c.clone()).await),
            Self::Scripted { reply } => Arc::new(ScriptedBackend::replying(reply.clone())),
        })
    }
}

/// Build the router from configuration. Entries that are disabled or whose
/// backend cannot be constructed (e.g. missing credentials) are left out
/// with a warning.
pub async fn build_router(config: &ProvidersConfig) -> ProviderRouter {
    let mut builder = ProviderRouter::builder(config.settings());
    for entry in config.entries.iter().filter(|e| e.enabled) {
        match entry.backend.build().await {
            Ok(backend) => {
                tracing::info!(
                    provider = %entry.id,
                    priority = entry.priority,
                    kind = backend.kind(),
                    "provider registered"
                );
                builder = builder.provider(entry.id.clone(), entry.priority, backend);
            }
            Err(e) => {
                tracing::warn!(provider = %entry.id, error = %e, "provider not registered");
            }
        }
    }
    builder.build()
}

//! AI provider layer for the command pipeline.
//!
//! Every backend (Ollama, OpenAI-compatible, Anthropic Messages, AWS Bedrock)
//! implements the same [`AiBackend`] capability. The [`ProviderRouter`] holds
//! them by profile id and answers one `complete` call with:
//!
//! - a response cache keyed by a request fingerprint, entries expiring by ttl;
//! - strict priority failover, skipping providers still in their cooldown;
//! - an ordered attempt list when every eligible provider fails.

pub mod anthropic;
pub mod backend;
pub mod bedrock;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod router;

pub use backend::{AiBackend, Prompt};
pub use cache::{CachedCompletion, Fingerprint, ResponseCache};
pub use config::{BackendConfig, ProviderEntry, ProvidersConfig, build_router};
pub use error::{BackendError, RouterError};
pub use health::{HealthTable, ProviderProfile};
pub use mock::ScriptedBackend;
pub use router::{
    CallCanceller, Completion, CompletionRequest, ProviderRouter, ProviderRouterBuilder,
    RouterSettings,
};

//! The capability every AI backend implements.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendResult;

/// A completion prompt: optional system instructions plus the user text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// One AI backend behind the router.
///
/// Implementations must return every failure as a [`BackendError`] value and
/// must be safe to drop mid-call (the router abandons calls on cancellation).
///
/// [`BackendError`]: crate::error::BackendError
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Produce a text completion for `prompt` within `timeout`.
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> BackendResult<String>;

    /// Backend family (for logging), e.g. "ollama".
    fn kind(&self) -> &str;
}

//! Scripted backend for tests and offline runs.
//!
//! Plays back a queue of canned outcomes, one per call. When the queue is
//! empty the fallback outcome repeats.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{AiBackend, Prompt};
use crate::error::{BackendError, BackendResult};

pub struct ScriptedBackend {
    script: Mutex<VecDeque<BackendResult<String>>>,
    fallback: BackendResult<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedBackend {
    /// Backend that always answers `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_fallback(Ok(text.into()))
    }

    /// Backend that always fails with `error`.
    pub fn failing(error: BackendError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: BackendResult<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue an outcome to be returned before the fallback.
    pub fn then(self, outcome: BackendResult<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    /// Sleep this long before answering (uses tokio time, so it honours
    /// `tokio::time::pause`).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AiBackend for ScriptedBackend {
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> BackendResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        if let Some(delay) = self.delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(BackendError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn kind(&self) -> &str {
        "scripted"
    }
}

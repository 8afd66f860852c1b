//! Capabilities the pipeline consumes from the CAD host.

use async_trait::async_trait;
use thiserror::Error;

use nlc_protocol::{EntityRef, ParameterSet, SceneSnapshot};

/// Reports the current state of the host document.
///
/// Called once per processed command, before reference resolution.
#[async_trait]
pub trait SceneSnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> SceneSnapshot;
}

/// What the host did for a deterministic action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    /// Human-readable result, e.g. "Created sphere obj-3".
    pub summary: String,
    /// Entities created or modified, oldest first.
    pub entities: Vec<EntityRef>,
    /// Optional structured detail passed through to the caller.
    pub payload: Option<serde_json::Value>,
}

impl ActionOutcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_entities(mut self, entities: Vec<EntityRef>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Failure reported by the host executor. Passed through to the caller
/// unmodified and never retried by the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    #[error("operation rejected: {0}")]
    Rejected(String),

    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("unsupported action: {0}")]
    Unsupported(String),

    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// Carries out deterministic intents in the host document.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        intent: &str,
        parameters: &ParameterSet,
    ) -> Result<ActionOutcome, ExecutorError>;
}

//! In-process host collaborators for tests and offline runs.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use nlc_protocol::{EntityRef, ParameterSet, SceneSnapshot};

use crate::collaborators::{ActionExecutor, ActionOutcome, ExecutorError, SceneSnapshotProvider};

/// Scene provider returning a fixed, replaceable snapshot.
#[derive(Debug, Default)]
pub struct MockScene {
    snapshot: Mutex<SceneSnapshot>,
}

impl MockScene {
    pub fn new(snapshot: SceneSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: SceneSnapshot) {
        if let Ok(mut current) = self.snapshot.lock() {
            *current = snapshot;
        }
    }
}

#[async_trait]
impl SceneSnapshotProvider for MockScene {
    async fn snapshot(&self) -> SceneSnapshot {
        self.snapshot.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Executor that records every call and fabricates entity ids for
/// creation intents ("obj-1", "obj-2", ...), placed at the requested center
/// or the origin.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<(String, ParameterSet)>>,
    next_id: AtomicUsize,
    failure: Option<ExecutorError>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that rejects every call with `error`.
    pub fn failing(error: ExecutorError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, ParameterSet)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(
        &self,
        intent: &str,
        parameters: &ParameterSet,
    ) -> Result<ActionOutcome, ExecutorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((intent.to_string(), parameters.clone()));
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        if let Some(shape) = intent.strip_prefix("Create") {
            let kind = shape.to_lowercase();
            let id = format!("obj-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let center = parameters.vector("center").unwrap_or_default();
            let mut entity = EntityRef::single(&id, &kind).with_position(center);
            if let Some(name) = parameters.text("name") {
                entity = entity.with_label(name);
            }
            return Ok(ActionOutcome::new(format!("Created {kind} {id}"))
                .with_entities(vec![entity]));
        }

        let touched: Vec<EntityRef> = parameters.entity("target").cloned().into_iter().collect();
        let summary = match touched.first() {
            Some(target) => format!("{intent} applied to {}", target.ids.join(", ")),
            None => format!("{intent} applied"),
        };
        Ok(ActionOutcome::new(summary).with_entities(touched))
    }
}

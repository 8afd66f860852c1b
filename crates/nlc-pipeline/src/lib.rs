//! Natural-language command pipeline.
//!
//! Turns free-form modeling requests into validated, executable CAD
//! commands. The [`Coordinator`] owns the stage order; each stage lives in
//! its own module and can be used on its own.

pub mod catalog;
pub mod classify;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod mock;
pub mod validate;

pub use catalog::{IntentCatalog, IntentSpec, ParamSpec};
pub use classify::{IntentClassifier, KeywordClassifier, ModelClassifier, TieredClassifier};
pub use collaborators::{ActionExecutor, ActionOutcome, ExecutorError, SceneSnapshotProvider};
pub use config::{ClassifierKind, PipelineConfig};
pub use context::{ContextStore, SessionStore};
pub use coordinator::{Coordinator, build_classifier};
pub use error::StageError;
pub use extract::ParameterExtractor;
pub use mock::{MockScene, RecordingExecutor};
pub use validate::{CommandValidator, ValidationOutcome};

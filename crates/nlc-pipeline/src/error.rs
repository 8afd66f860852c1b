//! Pipeline stage failures and their error kinds.

use thiserror::Error;

use nlc_protocol::ErrorKind;
use nlc_providers::RouterError;

use crate::collaborators::ExecutorError;
use crate::validate::ValidationOutcome;

/// The first failure that stopped a command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("please provide a command")]
    InputEmpty,

    #[error("could not recognize the command{}", best_guess.as_ref().map(|g| format!(" (best guess {g} at {confidence:.2})")).unwrap_or_default())]
    LowConfidence {
        best_guess: Option<String>,
        confidence: f64,
    },

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("parameter '{name}' out of range: {value}")]
    OutOfRange { name: String, value: String },

    #[error("parameter '{0}' has the wrong type")]
    TypeMismatch(String),

    #[error("no prior entity for '{0}'")]
    UnresolvedReference(String),

    #[error(transparent)]
    Provider(#[from] RouterError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputEmpty => ErrorKind::InputEmpty,
            Self::LowConfidence { .. } => ErrorKind::IntentLowConfidence,
            Self::MissingParameter(_) => ErrorKind::MissingParameter,
            Self::OutOfRange { .. } => ErrorKind::OutOfRangeParameter,
            Self::TypeMismatch(_) => ErrorKind::TypeMismatchParameter,
            Self::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            Self::Provider(RouterError::Exhausted { .. }) => ErrorKind::AllProvidersExhausted,
            Self::Provider(RouterError::UnknownProvider(_)) => ErrorKind::ProviderTransportError,
            Self::Executor(_) => ErrorKind::ExecutorFailure,
        }
    }

    /// Stage error for a failed validation outcome.
    pub fn from_validation(outcome: ValidationOutcome) -> Option<Self> {
        match outcome {
            ValidationOutcome::Valid => None,
            ValidationOutcome::MissingParameter(name) => Some(Self::MissingParameter(name)),
            ValidationOutcome::OutOfRange { name, value } => Some(Self::OutOfRange { name, value }),
            ValidationOutcome::TypeMismatch(name) => Some(Self::TypeMismatch(name)),
        }
    }
}

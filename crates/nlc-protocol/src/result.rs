use std::fmt;

use serde::{Deserialize, Serialize};

use crate::intent::UNRECOGNIZED;
use crate::params::ParameterSet;
use crate::provider::ProviderAttempt;

/// Failure taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InputEmpty,
    IntentLowConfidence,
    MissingParameter,
    OutOfRangeParameter,
    TypeMismatchParameter,
    UnresolvedReference,
    ProviderTimeout,
    ProviderTransportError,
    AllProvidersExhausted,
    ExecutorFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputEmpty => "InputEmpty",
            Self::IntentLowConfidence => "IntentLowConfidence",
            Self::MissingParameter => "MissingParameter",
            Self::OutOfRangeParameter => "OutOfRangeParameter",
            Self::TypeMismatchParameter => "TypeMismatchParameter",
            Self::UnresolvedReference => "UnresolvedReference",
            Self::ProviderTimeout => "ProviderTimeout",
            Self::ProviderTransportError => "ProviderTransportError",
            Self::AllProvidersExhausted => "AllProvidersExhausted",
            Self::ExecutorFailure => "ExecutorFailure",
        }
    }

    /// Local/validation failures: surfaced immediately, never retried.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InputEmpty
                | Self::IntentLowConfidence
                | Self::MissingParameter
                | Self::OutOfRangeParameter
                | Self::TypeMismatchParameter
                | Self::UnresolvedReference
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal value returned for one processed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub success: bool,
    /// Intent name; the best guess on low-confidence failures.
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub parameters: ParameterSet,
    /// Human-readable outcome or generated answer.
    pub message: String,
    /// Present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Structured output from the executor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Provider that produced a generative answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub cached: bool,
    /// Ordered provider attempts (diagnostics).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ProviderAttempt>,
    /// Providers the router passed over while they were cooling down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    pub elapsed_ms: u64,
}

impl PipelineResult {
    pub fn success(intent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            intent: intent.into(),
            confidence: 0.0,
            parameters: ParameterSet::new(),
            message: message.into(),
            error: None,
            error_kind: None,
            payload: None,
            provider: None,
            cached: false,
            attempts: Vec::new(),
            skipped: Vec::new(),
            elapsed_ms: 0,
        }
    }

    pub fn failure(intent: impl Into<String>, kind: ErrorKind, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            intent: intent.into(),
            confidence: 0.0,
            parameters: ParameterSet::new(),
            message: format!("{kind}: {error}"),
            error: Some(error),
            error_kind: Some(kind),
            payload: None,
            provider: None,
            cached: false,
            attempts: Vec::new(),
            skipped: Vec::new(),
            elapsed_ms: 0,
        }
    }

    /// Failure for empty/whitespace input.
    pub fn input_empty() -> Self {
        Self::failure(UNRECOGNIZED, ErrorKind::InputEmpty, "please provide a command")
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_attempts(mut self, attempts: Vec<ProviderAttempt>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_skipped(mut self, skipped: Vec<String>) -> Self {
        self.skipped = skipped;
        self
    }
}

use serde::{Deserialize, Serialize};

/// Name of the reserved intent returned when nothing clears the threshold.
pub const UNRECOGNIZED: &str = "Unrecognized";

/// How a classified intent is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    /// Deterministic, schema-driven action handed to the action executor.
    #[default]
    Action,
    /// Generative or explanatory answer produced through the provider router.
    Generative,
}

/// The strongest candidate a classifier saw, kept for diagnostics when the
/// returned intent is `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentGuess {
    pub name: String,
    pub confidence: f64,
}

/// A classified intent. Produced fresh per input and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent name (e.g. "CreateSphere").
    pub name: String,
    /// Classifier confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Parameter names the extractor should look for, from the intent schema.
    #[serde(default)]
    pub expected_params: Vec<String>,
    /// Deterministic action or generative answer.
    #[serde(default)]
    pub dispatch: DispatchKind,
    /// Best-scoring candidate when this intent is `Unrecognized`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_guess: Option<IntentGuess>,
}

impl Intent {
    /// The reserved "nothing matched" intent with confidence 0.
    pub fn unrecognized() -> Self {
        Self {
            name: UNRECOGNIZED.to_string(),
            confidence: 0.0,
            expected_params: Vec::new(),
            dispatch: DispatchKind::Action,
            best_guess: None,
        }
    }

    /// `Unrecognized`, remembering the candidate that fell short.
    pub fn below_threshold(guess: IntentGuess) -> Self {
        Self {
            best_guess: Some(guess),
            ..Self::unrecognized()
        }
    }

    pub fn is_unrecognized(&self) -> bool {
        self.name == UNRECOGNIZED
    }
}

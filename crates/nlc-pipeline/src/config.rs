//! Pipeline configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Local phrase scoring only.
    #[default]
    Keyword,
    /// Provider router only.
    Model,
    /// Keyword first, model on a miss.
    Tiered,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// Minimum classifier confidence to act on an intent.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Turns kept per session.
    #[serde(default = "default_context_capacity")]
    pub context_capacity: usize,
    /// Seconds a session may sit unused before it is forgotten.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default)]
    pub classifier: ClassifierKind,
    /// Serve repeated generative prompts from the router cache.
    #[serde(default = "default_true")]
    pub cache_generative: bool,
    /// Recent intent names included in generative prompts.
    #[serde(default = "default_prompt_history")]
    pub prompt_history: usize,
}

fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_context_capacity() -> usize {
    10
}
fn default_session_idle_secs() -> u64 {
    1800
}
fn default_true() -> bool {
    true
}
fn default_prompt_history() -> usize {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            context_capacity: default_context_capacity(),
            session_idle_secs: default_session_idle_secs(),
            classifier: ClassifierKind::default(),
            cache_generative: true,
            prompt_history: default_prompt_history(),
        }
    }
}

//! Intent classification.
//!
//! Three tiers behind one trait:
//! - **Keyword** (local): phrase scoring against the catalog's cues.
//! - **Model**: asks the provider router to pick an intent name.
//! - **Tiered**: keyword first, model when the keyword tier found nothing.
//!
//! Every tier returns `Unrecognized` for blank input and for anything below
//! the confidence threshold, keeping the strongest candidate as a best guess.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use nlc_protocol::{Intent, IntentGuess, normalize};
use nlc_providers::{CompletionRequest, Prompt, ProviderRouter};

use crate::catalog::{IntentCatalog, IntentSpec};

/// Trait for classifiers that map command text to an intent.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify `text`. Never fails; misses are `Unrecognized`.
    async fn classify(&self, text: &str) -> Intent;

    /// Name of this tier (for logging).
    fn tier_name(&self) -> &str;
}

const SCORE_TRIGGER_AND_SUBJECT: f64 = 0.95;
const SCORE_TRIGGER: f64 = 0.85;
const SCORE_TRIGGER_MISSING_SUBJECT: f64 = 0.40;

/// Lowercase words of `normalized`, punctuation dropped.
fn words(normalized: &str) -> Vec<&str> {
    normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether `phrase` occurs in `words` as whole consecutive words.
fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    !needle.is_empty() && words.windows(needle.len()).any(|w| w == needle.as_slice())
}

fn score(spec: &IntentSpec, words: &[&str]) -> f64 {
    let trigger = spec.triggers.iter().any(|p| contains_phrase(words, p));
    let subject = spec.subjects.iter().any(|p| contains_phrase(words, p));
    match (trigger, subject) {
        (true, true) => SCORE_TRIGGER_AND_SUBJECT,
        (true, false) if spec.subject_required => SCORE_TRIGGER_MISSING_SUBJECT,
        (true, false) => SCORE_TRIGGER,
        (false, true) => spec.subject_only,
        (false, false) => 0.0,
    }
}

/// Apply the threshold to a scored candidate.
fn decide(spec: &IntentSpec, confidence: f64, threshold: f64) -> Intent {
    if confidence >= threshold {
        spec.intent(confidence)
    } else if confidence > 0.0 {
        Intent::below_threshold(IntentGuess {
            name: spec.name.to_string(),
            confidence,
        })
    } else {
        Intent::unrecognized()
    }
}

/// Local phrase-scoring classifier.
pub struct KeywordClassifier {
    catalog: Arc<IntentCatalog>,
    threshold: f64,
}

impl KeywordClassifier {
    pub fn new(catalog: Arc<IntentCatalog>, threshold: f64) -> Self {
        Self { catalog, threshold }
    }

    fn classify_sync(&self, text: &str) -> Intent {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Intent::unrecognized();
        }
        let words = words(&normalized);

        // Strictly greater keeps the earlier catalog entry on ties.
        let mut best: Option<(&IntentSpec, f64)> = None;
        for spec in self.catalog.iter() {
            let s = score(spec, &words);
            if s > 0.0 && best.is_none_or(|(_, b)| s > b) {
                best = Some((spec, s));
            }
        }

        match best {
            Some((spec, confidence)) => decide(spec, confidence, self.threshold),
            None => Intent::unrecognized(),
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Intent {
        self.classify_sync(text)
    }

    fn tier_name(&self) -> &str {
        "keyword"
    }
}

/// Expected JSON shape from the model.
#[derive(Debug, Deserialize)]
struct ModelVerdict {
    intent: Option<String>,
    #[serde(default)]
    confidence: f64,
}

/// Extract JSON from model output that may be wrapped in markdown fences.
pub(crate) fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    trimmed
}

fn model_system_prompt(catalog: &IntentCatalog) -> String {
    let mut prompt = String::from(
        "You classify commands for a CAD application. Pick the single intent that best \
         matches the user's command.\n\nIntents:\n",
    );
    for spec in catalog.iter() {
        prompt.push_str(&format!("- {}: {}\n", spec.name, spec.description));
    }
    prompt.push_str(
        "\nRespond with ONLY a JSON object (no markdown, no explanation):\n\
         {\"intent\": \"<name>\", \"confidence\": <0.0-1.0>}\n\
         If no intent fits, respond with {\"intent\": null, \"confidence\": 0.0}",
    );
    prompt
}

/// Classifier backed by the provider router.
pub struct ModelClassifier {
    router: Arc<ProviderRouter>,
    catalog: Arc<IntentCatalog>,
    threshold: f64,
    system_prompt: String,
}

impl ModelClassifier {
    pub fn new(router: Arc<ProviderRouter>, catalog: Arc<IntentCatalog>, threshold: f64) -> Self {
        let system_prompt = model_system_prompt(&catalog);
        Self {
            router,
            catalog,
            threshold,
            system_prompt,
        }
    }
}

#[async_trait]
impl IntentClassifier for ModelClassifier {
    async fn classify(&self, text: &str) -> Intent {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Intent::unrecognized();
        }

        let request = CompletionRequest::new(
            Prompt::user(normalized).with_system(self.system_prompt.clone()),
        );
        let raw = match self.router.complete(request).await {
            Ok(completion) => completion.text,
            Err(e) => {
                tracing::warn!(error = %e, "model classification failed");
                return Intent::unrecognized();
            }
        };

        let verdict: ModelVerdict = match serde_json::from_str(extract_json(&raw)) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, raw = %raw, "unparseable classification");
                return Intent::unrecognized();
            }
        };

        let Some(name) = verdict.intent else {
            return Intent::unrecognized();
        };
        let Some(spec) = self.catalog.get(&name) else {
            tracing::warn!(intent = %name, "model returned unknown intent");
            return Intent::unrecognized();
        };
        decide(spec, verdict.confidence.clamp(0.0, 1.0), self.threshold)
    }

    fn tier_name(&self) -> &str {
        "model"
    }
}

/// Composite classifier that tries local scoring first, then the model.
pub struct TieredClassifier {
    local: Box<dyn IntentClassifier>,
    model: Box<dyn IntentClassifier>,
}

impl TieredClassifier {
    pub fn new(local: Box<dyn IntentClassifier>, model: Box<dyn IntentClassifier>) -> Self {
        Self { local, model }
    }
}

#[async_trait]
impl IntentClassifier for TieredClassifier {
    async fn classify(&self, text: &str) -> Intent {
        let local = self.local.classify(text).await;
        if !local.is_unrecognized() || normalize(text).is_empty() {
            return local;
        }

        tracing::debug!(tier = self.model.tier_name(), "local classification missed, falling back");
        let model = self.model.classify(text).await;
        if !model.is_unrecognized() {
            return model;
        }

        // Both missed: keep whichever near miss was stronger.
        let confidence = |i: &Intent| i.best_guess.as_ref().map_or(0.0, |g| g.confidence);
        if confidence(&model) > confidence(&local) {
            model
        } else {
            local
        }
    }

    fn tier_name(&self) -> &str {
        "tiered"
    }
}

//! Pipeline coordinator.
//!
//! Runs one command through the stages in order:
//! normalize → classify → snapshot scene → extract → resolve references →
//! validate → dispatch (executor or provider router) → record turn.
//!
//! The first failing stage short-circuits the rest. Every outcome, failed
//! ones included, is recorded as a turn in the session's context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nlc_protocol::{
    ConversationContext, ConversationTurn, DispatchKind, EntityRef, Intent, IntentGuess,
    ParamValue, ParameterSet, PipelineResult, SessionId, UNRECOGNIZED, normalize,
};
use nlc_providers::{CallCanceller, CompletionRequest, Prompt, ProviderRouter};

use crate::catalog::IntentCatalog;
use crate::classify::{IntentClassifier, KeywordClassifier, ModelClassifier, TieredClassifier};
use crate::collaborators::{ActionExecutor, SceneSnapshotProvider};
use crate::config::{ClassifierKind, PipelineConfig};
use crate::context::{ContextStore, SessionStore};
use crate::error::StageError;
use crate::extract::ParameterExtractor;
use crate::validate::CommandValidator;

/// Longest summary kept on a recorded turn.
const SUMMARY_CHARS: usize = 200;

/// Build the classifier tier named by `config`.
///
/// Model-backed tiers need at least one provider; without one the keyword
/// tier is used instead.
pub fn build_classifier(
    config: &PipelineConfig,
    catalog: Arc<IntentCatalog>,
    router: Arc<ProviderRouter>,
) -> Arc<dyn IntentClassifier> {
    let threshold = config.confidence_threshold;
    let keyword = || KeywordClassifier::new(catalog.clone(), threshold);

    match config.classifier {
        ClassifierKind::Keyword => Arc::new(keyword()),
        _ if !router.has_providers() => {
            tracing::warn!(
                classifier = ?config.classifier,
                "no providers configured, using keyword classifier"
            );
            Arc::new(keyword())
        }
        ClassifierKind::Model => Arc::new(ModelClassifier::new(router, catalog.clone(), threshold)),
        ClassifierKind::Tiered => Arc::new(TieredClassifier::new(
            Box::new(keyword()),
            Box::new(ModelClassifier::new(router, catalog.clone(), threshold)),
        )),
    }
}

/// What the stages learned before finishing or failing.
#[derive(Default)]
struct Progress {
    intent: Option<String>,
    confidence: f64,
    parameters: ParameterSet,
    entities: Vec<EntityRef>,
}

pub struct Coordinator {
    config: PipelineConfig,
    catalog: Arc<IntentCatalog>,
    classifier: Arc<dyn IntentClassifier>,
    extractor: ParameterExtractor,
    router: Arc<ProviderRouter>,
    scene: Arc<dyn SceneSnapshotProvider>,
    executor: Arc<dyn ActionExecutor>,
    sessions: Arc<SessionStore>,
}

impl Coordinator {
    pub fn new(
        config: PipelineConfig,
        catalog: Arc<IntentCatalog>,
        router: Arc<ProviderRouter>,
        scene: Arc<dyn SceneSnapshotProvider>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let classifier = build_classifier(&config, catalog.clone(), router.clone());
        let sessions = Arc::new(SessionStore::new(
            config.context_capacity,
            Duration::from_secs(config.session_idle_secs),
        ));
        Self {
            config,
            catalog,
            classifier,
            extractor: ParameterExtractor::new(),
            router,
            scene,
            executor,
            sessions,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one command for `session`.
    pub async fn process(&self, session: &SessionId, text: &str) -> PipelineResult {
        self.run(session, text, None).await
    }

    /// Like [`Coordinator::process`], but an in-flight provider call is
    /// abandoned when `canceller` fires.
    pub async fn process_cancellable(
        &self,
        session: &SessionId,
        text: &str,
        canceller: CallCanceller,
    ) -> PipelineResult {
        self.run(session, text, Some(canceller)).await
    }

    async fn run(
        &self,
        session: &SessionId,
        text: &str,
        canceller: Option<CallCanceller>,
    ) -> PipelineResult {
        let started = Instant::now();
        let store = self.sessions.get_or_create(session);
        let mut progress = Progress::default();

        let mut result = match self.stages(&store, text, canceller, &mut progress).await {
            Ok(result) => result,
            Err(err) => {
                let (attempts, skipped) = match &err {
                    StageError::Provider(e) => (e.attempts().to_vec(), e.skipped().to_vec()),
                    _ => (Vec::new(), Vec::new()),
                };
                let intent = progress.intent.as_deref().unwrap_or(UNRECOGNIZED);
                PipelineResult::failure(intent, err.kind(), err.to_string())
                    .with_confidence(progress.confidence)
                    .with_parameters(progress.parameters.clone())
                    .with_attempts(attempts)
                    .with_skipped(skipped)
            }
        };
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        let mut turn = ConversationTurn::new(text, &result.intent);
        turn.parameters = result.parameters.clone();
        turn.summary = summarize(&result.message);
        turn.success = result.success;
        turn.error_kind = result.error_kind;
        turn.entities = progress.entities;
        store.record(turn).await;

        match result.error_kind {
            None => tracing::info!(
                session = %session,
                intent = %result.intent,
                confidence = result.confidence,
                cached = result.cached,
                elapsed_ms = result.elapsed_ms,
                "command processed"
            ),
            // Rejected input is routine; collaborator failures are not.
            Some(kind) if kind.is_local() => tracing::info!(
                session = %session,
                intent = %result.intent,
                error_kind = %kind,
                error = result.error.as_deref().unwrap_or_default(),
                elapsed_ms = result.elapsed_ms,
                "command rejected"
            ),
            Some(kind) => tracing::warn!(
                session = %session,
                intent = %result.intent,
                error_kind = %kind,
                error = result.error.as_deref().unwrap_or_default(),
                attempts = result.attempts.len(),
                skipped = result.skipped.len(),
                elapsed_ms = result.elapsed_ms,
                "command failed"
            ),
        }
        result
    }

    async fn stages(
        &self,
        store: &ContextStore,
        text: &str,
        canceller: Option<CallCanceller>,
        progress: &mut Progress,
    ) -> Result<PipelineResult, StageError> {
        if normalize(text).is_empty() {
            return Err(StageError::InputEmpty);
        }

        let intent = self.classifier.classify(text).await;
        tracing::debug!(
            tier = self.classifier.tier_name(),
            intent = %intent.name,
            confidence = intent.confidence,
            "classified"
        );
        if intent.is_unrecognized() || intent.confidence < self.config.confidence_threshold {
            return Err(low_confidence(&intent, progress));
        }
        progress.intent = Some(intent.name.clone());
        progress.confidence = intent.confidence;

        store.refresh_scene(self.scene.snapshot().await).await;
        let context = store.get_current().await;

        progress.parameters = self.extractor.extract(text, &intent.expected_params);
        resolve_references(store, progress).await?;

        let outcome = CommandValidator::new(&self.catalog).validate(&intent, &progress.parameters);
        if let Some(err) = StageError::from_validation(outcome) {
            return Err(err);
        }

        let result = match intent.dispatch {
            DispatchKind::Action => {
                let outcome = self
                    .executor
                    .execute(&intent.name, &progress.parameters)
                    .await?;
                if !outcome.entities.is_empty() {
                    progress.entities = outcome.entities;
                }
                let mut result = PipelineResult::success(&intent.name, outcome.summary);
                result.payload = outcome.payload;
                result
            }
            DispatchKind::Generative => {
                let request = self.generative_request(&intent, text, &context, canceller);
                let completion = self.router.complete(request).await?;
                let mut result = PipelineResult::success(&intent.name, completion.text)
                    .with_attempts(completion.attempts)
                    .with_skipped(completion.skipped);
                result.provider = Some(completion.provider);
                result.cached = completion.cached;
                result
            }
        };

        Ok(result
            .with_confidence(intent.confidence)
            .with_parameters(progress.parameters.clone()))
    }

    /// Router request for a generative intent.
    ///
    /// The system prompt carries the scene and recent history, which change
    /// from turn to turn, so the cache key is only the intent and the
    /// question itself.
    fn generative_request(
        &self,
        intent: &Intent,
        text: &str,
        context: &ConversationContext,
        canceller: Option<CallCanceller>,
    ) -> CompletionRequest {
        let recent = context.recent_intents(self.config.prompt_history);
        let history = if recent.is_empty() {
            "none".to_string()
        } else {
            recent.join(", ")
        };
        let system = format!(
            "You are an assistant inside a CAD application. Answer briefly and concretely.\n\
             Scene: {}\n\
             Recent commands: {history}",
            context.scene.describe()
        );

        let mut request = CompletionRequest::new(Prompt::user(text.trim()).with_system(system))
            .with_cache_key(format!("{}\n{}", intent.name, text));
        if !self.config.cache_generative {
            request = request.without_cache();
        }
        if let Some(canceller) = canceller {
            request = request.with_canceller(canceller);
        }
        request
    }
}

fn low_confidence(intent: &Intent, progress: &mut Progress) -> StageError {
    let guess = intent.best_guess.clone().or_else(|| {
        (!intent.is_unrecognized()).then(|| IntentGuess {
            name: intent.name.clone(),
            confidence: intent.confidence,
        })
    });
    if let Some(guess) = &guess {
        progress.intent = Some(guess.name.clone());
        progress.confidence = guess.confidence;
    }
    StageError::LowConfidence {
        best_guess: guess.map(|g| g.name),
        confidence: progress.confidence,
    }
}

/// Bind every referring token to an entity from the session history and
/// turn relative placements into absolute points.
async fn resolve_references(store: &ContextStore, progress: &mut Progress) -> Result<(), StageError> {
    for (_, value) in progress.parameters.iter_mut() {
        match value {
            ParamValue::Reference(reference) if !reference.is_resolved() => {
                let Some(entity) = store.resolve_reference(&reference.token).await else {
                    return Err(StageError::UnresolvedReference(reference.token.clone()));
                };
                progress.entities.push(entity.clone());
                reference.resolved = Some(entity);
            }
            ParamValue::Placement(relation) => {
                let relation = *relation;
                let Some((anchor, at)) = store.last_placed_entity().await else {
                    return Err(StageError::UnresolvedReference(relation.as_str().to_string()));
                };
                let offset = relation.offset();
                *value = ParamValue::Vector([at[0] + offset[0], at[1] + offset[1], at[2] + offset[2]]);
                progress.entities.push(anchor);
            }
            _ => {}
        }
    }
    Ok(())
}

fn summarize(message: &str) -> String {
    let line = message.lines().next().unwrap_or_default();
    match line.char_indices().nth(SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

//! Priority failover router with response caching.
//!
//! One `complete` call:
//! 1. fingerprints the request (its cache key when set, else the prompt)
//!    and answers from the cache when a fresh entry exists (no provider
//!    call);
//! 2. walks the eligible providers in priority order, skipping those still
//!    cooling down after a failure;
//! 3. calls each under the configured timeout, marking it healthy on success
//!    (and caching the answer) or unhealthy on failure before moving on;
//! 4. fails with the ordered attempt list once every eligible provider failed.
//!
//! No lock is held while a provider call is in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use nlc_protocol::{AttemptOutcome, ProviderAttempt, ProviderStatus};

use crate::backend::{AiBackend, Prompt};
use crate::cache::{CachedCompletion, Fingerprint, ResponseCache};
use crate::error::{BackendError, RouterError};
use crate::health::{HealthTable, ProviderProfile};

/// Router-wide knobs, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterSettings {
    /// Per-call provider timeout.
    pub timeout: Duration,
    /// How long a failed provider is skipped.
    pub cooldown: Duration,
    pub cache_ttl: Duration,
    pub cache_enabled: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            cooldown: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(300),
            cache_enabled: true,
        }
    }
}

/// Handle that abandons a provider call.
///
/// A cancel abandons the call in flight, or the next one started if none is
/// in flight yet. The abandoned attempt is recorded as cancelled and the
/// provider is treated as failed; the router then continues with the next
/// candidate. Each `cancel` abandons at most one call. To stop the whole
/// request, drop the `complete` future instead.
#[derive(Debug, Clone, Default)]
pub struct CallCanceller(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    pending: AtomicBool,
    notify: Notify,
}

impl CallCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.pending.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    /// Resolves once a pending cancel is claimed by this waiter.
    async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel
            // cannot slip between the two.
            notified.as_mut().enable();
            if self.0.pending.swap(false, Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: Prompt,
    /// Restrict to these provider ids; `None` means every registered one.
    pub providers: Option<Vec<String>>,
    pub use_cache: bool,
    /// Cache identity to use instead of the full prompt.
    pub cache_key: Option<String>,
    pub canceller: Option<CallCanceller>,
}

impl CompletionRequest {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            providers: None,
            use_cache: true,
            cache_key: None,
            canceller: None,
        }
    }

    pub fn with_providers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Cache the answer under `key` (plus the provider set) rather than
    /// under the prompt, so context-bearing system prompts still hit.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_canceller(mut self, canceller: CallCanceller) -> Self {
        self.canceller = Some(canceller);
        self
    }
}

/// Successful router answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Provider that produced the text (originally, when served from cache).
    pub provider: String,
    pub cached: bool,
    /// Calls made for this request, failed ones included.
    pub attempts: Vec<ProviderAttempt>,
    /// Providers passed over because they were cooling down.
    pub skipped: Vec<String>,
}

pub struct ProviderRouter {
    backends: HashMap<String, Arc<dyn AiBackend>>,
    health: HealthTable,
    cache: ResponseCache,
    settings: RouterSettings,
}

/// Collects providers before the router's shared tables are built.
pub struct ProviderRouterBuilder {
    settings: RouterSettings,
    backends: HashMap<String, Arc<dyn AiBackend>>,
    profiles: Vec<ProviderProfile>,
}

impl ProviderRouterBuilder {
    /// Register `backend` under `id`. A later registration with the same id
    /// replaces the earlier one.
    pub fn provider(
        mut self,
        id: impl Into<String>,
        priority: u32,
        backend: Arc<dyn AiBackend>,
    ) -> Self {
        let id = id.into();
        self.profiles.retain(|p| p.id != id);
        self.profiles.push(ProviderProfile::new(id.clone(), priority));
        self.backends.insert(id, backend);
        self
    }

    pub fn build(self) -> ProviderRouter {
        tracing::info!(
            providers = self.backends.len(),
            cache_enabled = self.settings.cache_enabled,
            "provider router ready"
        );
        ProviderRouter {
            backends: self.backends,
            health: HealthTable::from_profiles(self.profiles, self.settings.cooldown),
            cache: ResponseCache::new(self.settings.cache_ttl),
            settings: self.settings,
        }
    }
}

impl ProviderRouter {
    pub fn builder(settings: RouterSettings) -> ProviderRouterBuilder {
        ProviderRouterBuilder {
            settings,
            backends: HashMap::new(),
            profiles: Vec::new(),
        }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn has_providers(&self) -> bool {
        !self.backends.is_empty()
    }

    /// Registered provider ids in priority order.
    pub async fn provider_ids(&self) -> Vec<String> {
        self.health.ordered_ids().await
    }

    pub async fn statuses(&self) -> Vec<ProviderStatus> {
        self.health.statuses().await
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion, RouterError> {
        let eligible = self.eligible(request.providers.as_deref()).await?;
        let fingerprint = match &request.cache_key {
            Some(key) => Fingerprint::for_key(key, &eligible),
            None => Fingerprint::compute(&request.prompt, &eligible),
        };
        let caching = self.settings.cache_enabled && request.use_cache;

        if caching && let Some(hit) = self.cache.get(&fingerprint).await {
            tracing::debug!(fingerprint = %fingerprint, provider = %hit.provider, "cache hit");
            return Ok(Completion {
                text: hit.text,
                provider: hit.provider,
                cached: true,
                attempts: Vec::new(),
                skipped: Vec::new(),
            });
        }

        let mut attempts = Vec::new();
        let mut skipped = Vec::new();
        let mut last_error = None;

        for id in &eligible {
            if self.health.in_cooldown(id).await {
                tracing::debug!(provider = %id, "skipping provider in cooldown");
                skipped.push(id.clone());
                continue;
            }
            let Some(backend) = self.backends.get(id) else {
                continue;
            };

            let started = Instant::now();
            let result = self
                .call(backend.as_ref(), &request.prompt, request.canceller.as_ref())
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(text) => {
                    self.health.mark_healthy(id).await;
                    attempts.push(ProviderAttempt {
                        provider: id.clone(),
                        outcome: AttemptOutcome::Success,
                        detail: None,
                        elapsed_ms,
                    });
                    tracing::info!(
                        provider = %id,
                        kind = backend.kind(),
                        elapsed_ms,
                        attempt = attempts.len(),
                        "provider call succeeded"
                    );
                    if caching {
                        self.cache
                            .insert(
                                fingerprint,
                                CachedCompletion {
                                    text: text.clone(),
                                    provider: id.clone(),
                                },
                            )
                            .await;
                    }
                    return Ok(Completion {
                        text,
                        provider: id.clone(),
                        cached: false,
                        attempts,
                        skipped,
                    });
                }
                Err(e) => {
                    tracing::warn!(provider = %id, error = %e, elapsed_ms, "provider call failed");
                    self.health.mark_unhealthy(id).await;
                    attempts.push(ProviderAttempt {
                        provider: id.clone(),
                        outcome: e.outcome(),
                        detail: Some(e.to_string()),
                        elapsed_ms,
                    });
                    last_error = Some(e);
                }
            }
        }

        tracing::warn!(
            attempts = attempts.len(),
            skipped = skipped.len(),
            "all providers exhausted"
        );
        Err(RouterError::Exhausted {
            attempts,
            skipped,
            last_error,
        })
    }

    /// Requested (or all) provider ids, ordered by priority.
    async fn eligible(&self, requested: Option<&[String]>) -> Result<Vec<String>, RouterError> {
        let ordered = self.health.ordered_ids().await;
        let Some(requested) = requested else {
            return Ok(ordered);
        };
        if let Some(unknown) = requested.iter().find(|id| !self.backends.contains_key(*id)) {
            return Err(RouterError::UnknownProvider(unknown.clone()));
        }
        Ok(ordered
            .into_iter()
            .filter(|id| requested.contains(id))
            .collect())
    }

    async fn call(
        &self,
        backend: &dyn AiBackend,
        prompt: &Prompt,
        canceller: Option<&CallCanceller>,
    ) -> Result<String, BackendError> {
        let timeout = self.settings.timeout;
        let bounded = async {
            match tokio::time::timeout(timeout, backend.complete(prompt, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        };

        match canceller {
            Some(canceller) => {
                tokio::select! {
                    biased;
                    _ = canceller.cancelled() => Err(BackendError::Cancelled),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }
}

//! Provider profiles and the shared health table.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;

use nlc_protocol::{ProviderHealth, ProviderStatus};

/// Routing metadata for one registered backend.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub id: String,
    /// 1 is tried first.
    pub priority: u32,
    pub health: ProviderHealth,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Monotonic instant of the last failure, for cooldown checks.
    unhealthy_since: Option<Instant>,
}

impl ProviderProfile {
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            priority,
            health: ProviderHealth::Unknown,
            last_failure_at: None,
            consecutive_failures: 0,
            unhealthy_since: None,
        }
    }

    pub fn mark_healthy(&mut self) {
        self.health = ProviderHealth::Healthy;
        self.consecutive_failures = 0;
        self.unhealthy_since = None;
    }

    pub fn mark_unhealthy(&mut self, now: Instant) {
        self.health = ProviderHealth::Unhealthy;
        self.last_failure_at = Some(Utc::now());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.unhealthy_since = Some(now);
    }

    /// Unhealthy and the cooldown window has not yet elapsed.
    pub fn in_cooldown(&self, now: Instant, cooldown: Duration) -> bool {
        self.health == ProviderHealth::Unhealthy
            && self
                .unhealthy_since
                .is_some_and(|since| now.duration_since(since) < cooldown)
    }

    pub fn status(&self, now: Instant, cooldown: Duration) -> ProviderStatus {
        ProviderStatus {
            id: self.id.clone(),
            priority: self.priority,
            health: self.health,
            last_failure_at: self.last_failure_at,
            consecutive_failures: self.consecutive_failures,
            in_cooldown: self.in_cooldown(now, cooldown),
        }
    }
}

/// Health of every registered provider, shared across concurrent requests.
///
/// Profiles are kept sorted by priority; equal priorities keep the order
/// they were registered in.
pub struct HealthTable {
    profiles: RwLock<Vec<ProviderProfile>>,
    cooldown: Duration,
}

impl HealthTable {
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = ProviderProfile>,
        cooldown: Duration,
    ) -> Self {
        let mut profiles: Vec<ProviderProfile> = profiles.into_iter().collect();
        // Stable sort keeps registration order among equal priorities.
        profiles.sort_by_key(|p| p.priority);
        Self {
            profiles: RwLock::new(profiles),
            cooldown,
        }
    }

    /// Provider ids in routing order.
    pub async fn ordered_ids(&self) -> Vec<String> {
        self.profiles
            .read()
            .await
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }

    pub async fn in_cooldown(&self, id: &str) -> bool {
        let now = Instant::now();
        self.profiles
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .is_some_and(|p| p.in_cooldown(now, self.cooldown))
    }

    pub async fn mark_healthy(&self, id: &str) {
        if let Some(profile) = self.profiles.write().await.iter_mut().find(|p| p.id == id) {
            profile.mark_healthy();
        }
    }

    pub async fn mark_unhealthy(&self, id: &str) {
        let now = Instant::now();
        if let Some(profile) = self.profiles.write().await.iter_mut().find(|p| p.id == id) {
            profile.mark_unhealthy(now);
            tracing::warn!(
                provider = %id,
                consecutive_failures = profile.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "provider marked unhealthy"
            );
        }
    }

    /// Snapshots in routing order.
    pub async fn statuses(&self) -> Vec<ProviderStatus> {
        let now = Instant::now();
        self.profiles
            .read()
            .await
            .iter()
            .map(|p| p.status(now, self.cooldown))
            .collect()
    }
}

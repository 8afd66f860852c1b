use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability of a registered AI backend as last observed by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderHealth {
    Healthy,
    Unhealthy,
    /// Never called yet.
    #[default]
    Unknown,
}

/// Read-only view of a provider profile (for diagnostics endpoints).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub id: String,
    /// Priority rank; 1 is tried first.
    pub priority: u32,
    pub health: ProviderHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Whether the provider is currently being skipped.
    pub in_cooldown: bool,
}

/// How one provider attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Transport,
    /// Non-success HTTP status.
    Status,
    /// Response arrived but could not be understood.
    Malformed,
    /// Abandoned because the caller cancelled the in-flight call.
    Cancelled,
}

/// One entry in the router's ordered attempt list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_defaults_to_unknown() {
        assert_eq!(ProviderHealth::default(), ProviderHealth::Unknown);
        assert_eq!(
            serde_json::to_string(&ProviderHealth::Unhealthy).unwrap(),
            r#""unhealthy""#
        );
    }

    #[test]
    fn attempt_skips_empty_detail() {
        let attempt = ProviderAttempt {
            provider: "ollama".into(),
            outcome: AttemptOutcome::Success,
            detail: None,
            elapsed_ms: 12,
        };
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(!json.contains("detail"));
        assert!(json.contains(r#""outcome":"success""#));
    }
}

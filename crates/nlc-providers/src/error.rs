//! Provider-layer error types.

use std::time::Duration;

use thiserror::Error;

use nlc_protocol::{AttemptOutcome, ProviderAttempt};

/// Typed failure of a single backend call. Backends never panic or throw;
/// every failure mode ends up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("call cancelled by caller")]
    Cancelled,
}

impl BackendError {
    /// Attempt outcome recorded for this failure.
    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Timeout { .. } => AttemptOutcome::Timeout,
            Self::Transport(_) => AttemptOutcome::Transport,
            Self::Status { .. } => AttemptOutcome::Status,
            Self::Malformed(_) => AttemptOutcome::Malformed,
            Self::Cancelled => AttemptOutcome::Cancelled,
        }
    }

    /// Classify a reqwest failure for a call made with `timeout`.
    pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Terminal router failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    /// Every eligible provider failed (or none was eligible).
    #[error("all providers exhausted after {} attempt(s){}", attempts.len(), last_error.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    Exhausted {
        /// Ordered attempts actually made.
        attempts: Vec<ProviderAttempt>,
        /// Providers skipped because they were cooling down.
        skipped: Vec<String>,
        last_error: Option<BackendError>,
    },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
}

impl RouterError {
    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            Self::Exhausted { attempts, .. } => attempts,
            Self::UnknownProvider(_) => &[],
        }
    }

    /// Providers passed over while cooling down.
    pub fn skipped(&self) -> &[String] {
        match self {
            Self::Exhausted { skipped, .. } => skipped,
            Self::UnknownProvider(_) => &[],
        }
    }
}

/// Convenience alias for backend results.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_mapping() {
        assert_eq!(
            BackendError::Timeout { timeout_ms: 5 }.outcome(),
            AttemptOutcome::Timeout
        );
        assert_eq!(
            BackendError::Status {
                status: 500,
                body: String::new()
            }
            .outcome(),
            AttemptOutcome::Status
        );
        assert_eq!(BackendError::Cancelled.outcome(), AttemptOutcome::Cancelled);
    }

    #[test]
    fn exhausted_message_includes_last_error() {
        let err = RouterError::Exhausted {
            attempts: vec![],
            skipped: vec!["a".into()],
            last_error: Some(BackendError::Transport("connection refused".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("0 attempt(s)"));
        assert!(msg.contains("connection refused"));
        assert_eq!(err.skipped(), ["a".to_string()]);
        assert!(RouterError::UnknownProvider("x".into()).skipped().is_empty());
    }
}

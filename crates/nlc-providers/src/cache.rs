//! Fingerprint-keyed response cache with per-entry ttl.
//!
//! Expired entries are evicted on lookup and swept on every insert, so the
//! map never holds more than one ttl's worth of answers. There is no
//! background task. Time comes from `tokio::time::Instant` so tests can
//! pause it.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;

use nlc_protocol::normalize;

use crate::backend::Prompt;

/// Cache key derived from the semantically relevant parts of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// SHA-256 over the normalized user text, the system prompt and the
    /// ordered eligible provider ids. Fields are length-prefixed so that
    /// moving text between them changes the digest.
    pub fn compute<S: AsRef<str>>(prompt: &Prompt, provider_ids: &[S]) -> Self {
        Self::digest(
            &[
                "prompt",
                normalize(&prompt.user).as_str(),
                prompt.system.as_deref().unwrap_or(""),
            ],
            provider_ids,
        )
    }

    /// Like [`compute`](Self::compute) but keyed on a caller-chosen string
    /// instead of the full prompt. Callers whose system prompt carries
    /// volatile context (scene, recent history) use this to keep repeated
    /// questions cacheable.
    pub fn for_key<S: AsRef<str>>(key: &str, provider_ids: &[S]) -> Self {
        Self::digest(&["key", normalize(key).as_str()], provider_ids)
    }

    fn digest<S: AsRef<str>>(fields: &[&str], provider_ids: &[S]) -> Self {
        let mut hasher = Sha256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        };

        for f in fields {
            field(f.as_bytes());
        }
        for id in provider_ids {
            field(id.as_ref().as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs.
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Payload stored per fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCompletion {
    pub text: String,
    /// Provider that produced the text.
    pub provider: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedCompletion,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

pub struct ResponseCache {
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh entry for `fingerprint`, if any. An expired entry is removed.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<CachedCompletion> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(fingerprint) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.payload.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Another writer may have refreshed it between the two locks.
        if let Some(entry) = entries.get(fingerprint) {
            if !entry.is_expired(now) {
                return Some(entry.payload.clone());
            }
            entries.remove(fingerprint);
            tracing::debug!(fingerprint = %fingerprint, "evicted expired cache entry");
        }
        None
    }

    /// Store `payload`, sweeping expired entries first.
    pub async fn insert(&self, fingerprint: Fingerprint, payload: CachedCompletion) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, "swept expired cache entries");
        }
        entries.insert(
            fingerprint,
            CacheEntry {
                payload,
                created_at: now,
                ttl: self.ttl,
            },
        );
    }

    /// Number of stored entries, expired ones included until evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str) -> CachedCompletion {
        CachedCompletion {
            text: text.into(),
            provider: "local".into(),
        }
    }

    #[test]
    fn fingerprint_ignores_case_and_spacing() {
        let ids = ["local", "cloud"];
        let a = Fingerprint::compute(&Prompt::user("Describe  the SCENE"), &ids);
        let b = Fingerprint::compute(&Prompt::user("describe the scene "), &ids);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_depends_on_system_and_providers() {
        let base = Fingerprint::compute(&Prompt::user("hi"), &["local"]);
        let with_system =
            Fingerprint::compute(&Prompt::user("hi").with_system("scene: empty"), &["local"]);
        let other_set = Fingerprint::compute(&Prompt::user("hi"), &["local", "cloud"]);
        let reordered = Fingerprint::compute(&Prompt::user("hi"), &["cloud", "local"]);
        assert_ne!(base, with_system);
        assert_ne!(base, other_set);
        assert_ne!(other_set, reordered);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_served_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let fp = Fingerprint::compute(&Prompt::user("hi"), &["local"]);
        cache.insert(fp.clone(), payload("hello")).await;

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&fp).await, Some(payload("hello")));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_evicted_on_lookup() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let fp = Fingerprint::compute(&Prompt::user("hi"), &["local"]);
        cache.insert(fp.clone(), payload("hello")).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&fp).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_sweeps_only_expired_entries() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        for i in 0..50 {
            let fp = Fingerprint::compute(&Prompt::user(format!("question {i}")), &["local"]);
            cache.insert(fp, payload("a")).await;
        }
        tokio::time::advance(Duration::from_secs(8)).await;
        let recent = Fingerprint::compute(&Prompt::user("recent"), &["local"]);
        cache.insert(recent.clone(), payload("b")).await;
        assert_eq!(cache.len().await, 51);

        tokio::time::advance(Duration::from_secs(5)).await;
        let latest = Fingerprint::compute(&Prompt::user("latest"), &["local"]);
        cache.insert(latest.clone(), payload("c")).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&recent).await, Some(payload("b")));
        assert_eq!(cache.get(&latest).await, Some(payload("c")));
    }

    #[test]
    fn keyed_fingerprint_ignores_prompt_and_normalizes_key() {
        let ids = ["local"];
        let a = Fingerprint::for_key("AskQuestion\nWhat is a  chamfer", &ids);
        let b = Fingerprint::for_key("askquestion\nwhat is a chamfer ", &ids);
        assert_eq!(a, b);
        assert_ne!(a, Fingerprint::for_key("askquestion\nwhat is a fillet", &ids));
        assert_ne!(a, Fingerprint::for_key("askquestion\nwhat is a chamfer", &["cloud"]));
        assert_ne!(
            Fingerprint::for_key("what is a chamfer", &ids),
            Fingerprint::compute(&Prompt::user("key").with_system("what is a chamfer"), &ids)
        );
    }
}

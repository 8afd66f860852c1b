//! Per-session conversation context and the session registry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;

use nlc_protocol::{ConversationContext, ConversationTurn, EntityRef, SceneSnapshot, SessionId};

/// Tokens that name the single most recent entity.
const SINGULAR: &[&str] = &["it", "that", "this", "the last one", "the previous one"];
/// Tokens that name everything the latest entity-bearing turn touched.
const PLURAL: &[&str] = &["them", "those", "these", "the selected objects", "the selection"];

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Default)]
struct History {
    turns: VecDeque<ConversationTurn>,
    scene: SceneSnapshot,
}

/// Bounded turn history plus the latest scene snapshot for one session.
///
/// Safe to share between concurrent requests; every method takes `&self`.
#[derive(Debug)]
pub struct ContextStore {
    session_id: SessionId,
    capacity: usize,
    history: RwLock<History>,
}

impl ContextStore {
    pub fn new(session_id: SessionId, capacity: usize) -> Self {
        Self {
            session_id,
            capacity: capacity.max(1),
            history: RwLock::new(History::default()),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the history (oldest first) and scene.
    pub async fn get_current(&self) -> ConversationContext {
        let history = self.history.read().await;
        ConversationContext {
            session_id: self.session_id.clone(),
            turns: history.turns.iter().cloned().collect(),
            scene: history.scene.clone(),
        }
    }

    /// Append a turn, evicting the oldest beyond capacity.
    pub async fn record(&self, turn: ConversationTurn) {
        let mut history = self.history.write().await;
        history.turns.push_back(turn);
        while history.turns.len() > self.capacity {
            history.turns.pop_front();
        }
    }

    /// Entity a referring token points at, searching newest turns first.
    pub async fn resolve_reference(&self, token: &str) -> Option<EntityRef> {
        let token = token.trim().to_lowercase();
        let history = self.history.read().await;

        if SINGULAR.contains(&token.as_str()) {
            history
                .turns
                .iter()
                .rev()
                .find_map(|t| t.entities.last().cloned())
        } else if PLURAL.contains(&token.as_str()) {
            history
                .turns
                .iter()
                .rev()
                .find(|t| !t.entities.is_empty())
                .and_then(|t| EntityRef::group(&t.entities))
        } else {
            None
        }
    }

    /// Most recent entity with a known position, and that position.
    pub async fn last_placed_entity(&self) -> Option<(EntityRef, [f64; 3])> {
        let history = self.history.read().await;
        history
            .turns
            .iter()
            .rev()
            .flat_map(|t| t.entities.iter().rev())
            .find_map(|e| e.position.map(|p| (e.clone(), p)))
    }

    pub async fn refresh_scene(&self, scene: SceneSnapshot) {
        self.history.write().await.scene = scene;
    }

    /// Drop all turns and the scene snapshot.
    pub async fn clear(&self) {
        let mut history = self.history.write().await;
        history.turns.clear();
        history.scene = SceneSnapshot::default();
    }

    pub async fn len(&self) -> usize {
        self.history.read().await.turns.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.read().await.turns.is_empty()
    }
}

#[derive(Debug)]
struct Session {
    store: Arc<ContextStore>,
    last_seen: Instant,
}

/// Registry of context stores keyed by session handle.
///
/// Sessions untouched for longer than the idle ttl are dropped the next time
/// any session is opened, unless a request still holds them.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
    capacity: usize,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(capacity: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity,
            idle_ttl,
        }
    }

    /// Open (or create) a session and mark it as just used.
    pub fn get_or_create(&self, id: &SessionId) -> Arc<ContextStore> {
        let now = Instant::now();
        self.evict_idle(now);

        let mut session = self.sessions.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(session = %id, "session created");
            Session {
                store: Arc::new(ContextStore::new(id.clone(), self.capacity)),
                last_seen: now,
            }
        });
        session.last_seen = now;
        session.store.clone()
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<ContextStore>> {
        self.sessions.get(id).map(|s| s.store.clone())
    }

    fn evict_idle(&self, now: Instant) {
        self.sessions.retain(|id, session| {
            let in_use = Arc::strong_count(&session.store) > 1;
            let keep = in_use || now.duration_since(session.last_seen) < self.idle_ttl;
            if !keep {
                tracing::debug!(session = %id, "idle session evicted");
            }
            keep
        });
    }

    /// Forget a session. Returns whether it existed.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Known session ids, sorted.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_IDLE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(input: &str, entities: Vec<EntityRef>) -> ConversationTurn {
        let mut t = ConversationTurn::new(input, "CreateSphere");
        t.entities = entities;
        t.success = true;
        t
    }

    fn store() -> ContextStore {
        ContextStore::new(SessionId::default(), 3)
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_capacity() {
        let store = store();
        for i in 0..4 {
            store.record(turn(&format!("turn {i}"), vec![])).await;
        }
        let ctx = store.get_current().await;
        assert_eq!(ctx.turns.len(), 3);
        assert_eq!(ctx.turns[0].input, "turn 1");
        assert_eq!(ctx.turns[2].input, "turn 3");
        assert!(ctx.turns.iter().all(|t| t.input != "turn 0"));
    }

    #[tokio::test]
    async fn singular_token_resolves_most_recent_entity() {
        let store = store();
        store
            .record(turn("a", vec![EntityRef::single("s1", "sphere")]))
            .await;
        store
            .record(turn(
                "b",
                vec![EntityRef::single("b1", "box"), EntityRef::single("b2", "box")],
            ))
            .await;
        store.record(turn("c", vec![])).await;

        for token in ["it", "That", " the last one "] {
            let entity = store.resolve_reference(token).await.unwrap();
            assert_eq!(entity.ids, vec!["b2"], "{token}");
        }
    }

    #[tokio::test]
    async fn plural_token_resolves_group_of_latest_turn() {
        let store = store();
        store
            .record(turn("a", vec![EntityRef::single("s1", "sphere")]))
            .await;
        store
            .record(turn(
                "b",
                vec![EntityRef::single("b1", "box"), EntityRef::single("b2", "box")],
            ))
            .await;

        let group = store.resolve_reference("them").await.unwrap();
        assert_eq!(group.kind, "group");
        assert_eq!(group.ids, vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn nothing_to_resolve_against() {
        let store = store();
        assert!(store.resolve_reference("it").await.is_none());
        store
            .record(turn("a", vec![EntityRef::single("s1", "sphere")]))
            .await;
        assert!(store.resolve_reference("sphere").await.is_none());
    }

    #[tokio::test]
    async fn refresh_and_clear() {
        let store = store();
        store
            .refresh_scene(SceneSnapshot {
                object_count: 2,
                object_types: vec!["box".into(), "sphere".into()],
                ..SceneSnapshot::default()
            })
            .await;
        store.record(turn("a", vec![])).await;
        assert_eq!(store.get_current().await.scene.object_count, 2);

        store.clear().await;
        let ctx = store.get_current().await;
        assert!(ctx.turns.is_empty());
        assert_eq!(ctx.scene, SceneSnapshot::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_respect_capacity() {
        let store = Arc::new(ContextStore::new(SessionId::default(), 10));
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.record(turn(&format!("t{i}"), vec![])).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len().await, 10);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let sessions = SessionStore::new(5, DEFAULT_IDLE_TTL);
        let a = sessions.get_or_create(&SessionId::new("a"));
        let b = sessions.get_or_create(&SessionId::new("b"));
        a.record(turn("only in a", vec![])).await;

        assert_eq!(a.len().await, 1);
        assert!(b.is_empty().await);
        assert!(Arc::ptr_eq(&a, &sessions.get_or_create(&SessionId::new("a"))));
        assert_eq!(sessions.ids(), vec![SessionId::new("a"), SessionId::new("b")]);

        assert!(sessions.remove(&SessionId::new("a")));
        assert!(!sessions.remove(&SessionId::new("a")));
        assert!(sessions.get(&SessionId::new("a")).is_none());
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted() {
        let sessions = SessionStore::new(5, Duration::from_secs(60));
        for i in 0..20 {
            sessions.get_or_create(&SessionId::new(format!("s{i}")));
        }
        let held = sessions.get_or_create(&SessionId::new("held"));
        assert_eq!(sessions.len(), 21);

        tokio::time::advance(Duration::from_secs(30)).await;
        drop(sessions.get_or_create(&SessionId::new("s0")));
        tokio::time::advance(Duration::from_secs(31)).await;
        let _fresh = sessions.get_or_create(&SessionId::new("fresh"));

        assert_eq!(
            sessions.ids(),
            vec![SessionId::new("fresh"), SessionId::new("held"), SessionId::new("s0")]
        );
        assert!(Arc::ptr_eq(&held, &sessions.get(&SessionId::new("held")).unwrap()));
    }

    #[tokio::test]
    async fn last_placed_entity_skips_unpositioned() {
        let store = store();
        assert!(store.last_placed_entity().await.is_none());
        store
            .record(turn(
                "a",
                vec![EntityRef::single("s1", "sphere").with_position([1.0, 2.0, 3.0])],
            ))
            .await;
        store
            .record(turn("b", vec![EntityRef::single("g", "group")]))
            .await;

        let (entity, at) = store.last_placed_entity().await.unwrap();
        assert_eq!(entity.ids, vec!["s1"]);
        assert_eq!(at, [1.0, 2.0, 3.0]);
    }
}

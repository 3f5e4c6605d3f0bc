use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::ConversationTurn;

/// Append-only chat history for one session
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    last_active: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            last_active: Utc::now(),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.last_active = turn.created_at;
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-session conversations. Sessions never see each other's turns.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Conversation>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse `requested` if given, otherwise mint a new session id
    pub async fn open(&self, requested: Option<Uuid>) -> Uuid {
        let id = requested.unwrap_or_else(Uuid::new_v4);
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id)
            .and_modify(|c| c.last_active = Utc::now())
            .or_default();
        id
    }

    /// Append a user turn and its reply under one lock so the pair stays adjacent
    pub async fn record_exchange(&self, id: Uuid, user: &str, assistant: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let conversation = sessions.entry(id).or_default();
        conversation.push(ConversationTurn::user(user));
        conversation.push(ConversationTurn::assistant(assistant));
        conversation.turns().len()
    }

    /// Turns of a live session, oldest first; `None` if it never existed or was ended
    pub async fn history(&self, id: Uuid) -> Option<Vec<ConversationTurn>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|c| c.turns().to_vec())
    }

    /// Drop a session's history; returns whether it existed
    pub async fn end(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session = %id, "Session ended, conversation cleared");
        }
        removed
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// End every session with no activity for longer than `max_idle`
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, c| c.last_active > cutoff);
        before - sessions.len()
    }

    /// Evict idle sessions every `every` until `shutdown` fires
    pub async fn sweep_idle(&self, max_idle: Duration, every: Duration, shutdown: &CancellationToken) {
        // interval() panics on a zero period
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = self.evict_idle(max_idle).await;
                    if evicted > 0 {
                        let active = self.active_sessions().await;
                        tracing::info!(
                            evicted,
                            active,
                            "Idle sessions cleared"
                        );
                    }
                }
            }
        }
        tracing::debug!("Session sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_exchange_appends_user_then_assistant() {
        let store = SessionStore::new();
        let id = store.open(None).await;

        store.record_exchange(id, "Ciao", "Ciao! Come stai?").await;
        let len = store.record_exchange(id, "Male", "Mi dispiace.").await;

        assert_eq!(len, 4);
        let turns = store.history(id).await.expect("session exists");
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(turns[2].content, "Male");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.open(None).await;
        let b = store.open(None).await;
        assert_ne!(a, b);

        store.record_exchange(a, "domanda", "risposta").await;

        assert_eq!(store.history(a).await.map(|t| t.len()), Some(2));
        assert_eq!(store.history(b).await.map(|t| t.len()), Some(0));
        assert_eq!(store.active_sessions().await, 2);
    }

    #[tokio::test]
    async fn test_end_clears_history() {
        let store = SessionStore::new();
        let id = store.open(None).await;
        store.record_exchange(id, "domanda", "risposta").await;

        assert!(store.end(id).await);
        assert!(!store.end(id).await);
        assert!(store.history(id).await.is_none());
    }

    #[tokio::test]
    async fn test_open_reuses_requested_id() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.open(Some(id)).await, id);
        store.record_exchange(id, "a", "b").await;
        assert_eq!(store.open(Some(id)).await, id);
        assert_eq!(store.history(id).await.map(|t| t.len()), Some(2));
    }

    #[tokio::test]
    async fn test_evict_idle_drops_only_stale_sessions() {
        let store = SessionStore::new();
        for _ in 0..100 {
            let id = store.open(None).await;
            store.record_exchange(id, "domanda", "risposta").await;
        }

        assert_eq!(store.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.active_sessions().await, 100);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let fresh = store.open(None).await;

        assert_eq!(store.evict_idle(Duration::from_millis(10)).await, 100);
        assert_eq!(store.active_sessions().await, 1);
        assert!(store.history(fresh).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_runs_until_shutdown() {
        let store = Arc::new(SessionStore::new());
        let id = store.open(None).await;
        store.record_exchange(id, "domanda", "risposta").await;

        let shutdown = CancellationToken::new();
        let sweeper = {
            let store = Arc::clone(&store);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                store
                    .sweep_idle(Duration::ZERO, Duration::from_millis(5), &shutdown)
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.active_sessions().await, 0);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .expect("sweep should stop on shutdown")
            .expect("sweep task should not panic");
    }
}

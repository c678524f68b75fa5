//! In-memory checkpoint store. Snapshots live for the process lifetime.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use toolchat_core::checkpoint::CheckpointStore;
use toolchat_core::error::CheckpointError;
use toolchat_core::message::SessionId;
use toolchat_core::state::ConversationState;

#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    sessions: Arc<RwLock<HashMap<SessionId, ConversationState>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with a saved snapshot.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, session: &SessionId) -> Result<ConversationState, CheckpointError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, session: &SessionId, state: &ConversationState) -> Result<(), CheckpointError> {
        self.sessions
            .write()
            .await
            .insert(session.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolchat_core::message::Message;

    #[tokio::test]
    async fn unseen_session_loads_empty() {
        let store = InMemoryCheckpointStore::new();
        let state = store.load(&SessionId::new()).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let store = InMemoryCheckpointStore::new();
        let session = SessionId::new();
        let mut state = ConversationState::new();
        state
            .merge([Message::user("hi"), Message::assistant("hello")])
            .unwrap();

        store.save(&session, &state).await.unwrap();
        assert_eq!(store.load(&session).await.unwrap(), state);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryCheckpointStore::new();
        let (a, b) = (SessionId::new(), SessionId::new());
        let mut state = ConversationState::new();
        state.merge([Message::user("only in a")]).unwrap();
        store.save(&a, &state).await.unwrap();

        assert!(store.load(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = InMemoryCheckpointStore::new();
        let handle = store.clone();
        let session = SessionId::new();
        let mut state = ConversationState::new();
        state.merge([Message::user("shared")]).unwrap();
        handle.save(&session, &state).await.unwrap();
        assert_eq!(store.load(&session).await.unwrap().len(), 1);
    }
}

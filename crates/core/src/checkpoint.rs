//! CheckpointStore trait: durable snapshots of conversation state.
//!
//! One snapshot per session id; `save` overwrites. Callers must not run two
//! turns of the same session concurrently: the store does no locking and the
//! last writer wins.

use async_trait::async_trait;

use crate::error::CheckpointError;
use crate::message::SessionId;
use crate::state::ConversationState;

/// Implementations: in-memory, SQLite, PostgreSQL.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The backend name (e.g., "memory", "sqlite", "postgres").
    fn name(&self) -> &str;

    /// Latest snapshot for `session`, or an empty state if it was never saved.
    async fn load(&self, session: &SessionId) -> Result<ConversationState, CheckpointError>;

    /// Replace the snapshot for `session`.
    async fn save(&self, session: &SessionId, state: &ConversationState) -> Result<(), CheckpointError>;
}

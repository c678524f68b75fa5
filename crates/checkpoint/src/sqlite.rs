//! SQLite checkpoint store.
//!
//! One row per session in `checkpoints`, holding the JSON-encoded
//! conversation state. `save` upserts, so the row always holds the latest
//! snapshot.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use toolchat_core::checkpoint::CheckpointStore;
use toolchat_core::error::CheckpointError;
use toolchat_core::message::SessionId;
use toolchat_core::state::ConversationState;
use tracing::{debug, info};

use crate::codec;

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) the database at `url`, e.g. `sqlite://checkpoints.db`.
    ///
    /// `sqlite::memory:` gives a private in-process database.
    pub async fn connect(url: &str, acquire_timeout: Duration) -> Result<Self, CheckpointError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| CheckpointError::Unavailable(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its single connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| CheckpointError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!(url = %url, "SQLite checkpoint store initialized");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CheckpointError> {
        let store = Self { pool };
        store.setup().await?;
        Ok(store)
    }

    async fn setup(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id   TEXT PRIMARY KEY NOT NULL,
                state       TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Setup(format!("checkpoints table: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, session: &SessionId) -> Result<ConversationState, CheckpointError> {
        let row = sqlx::query("SELECT state FROM checkpoints WHERE thread_id = ?1")
            .bind(session.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(format!("load {session}: {e}")))?;

        match row {
            Some(row) => {
                let raw: String = row
                    .try_get("state")
                    .map_err(|e| CheckpointError::Storage(e.to_string()))?;
                codec::decode(session, &raw)
            }
            None => {
                debug!(session_id = %session, "No checkpoint yet");
                Ok(ConversationState::new())
            }
        }
    }

    async fn save(&self, session: &SessionId, state: &ConversationState) -> Result<(), CheckpointError> {
        let encoded = codec::encode(state)?;
        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, state, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(thread_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session.as_str())
        .bind(encoded)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(format!("save {session}: {e}")))?;

        debug!(session_id = %session, messages = state.len(), "Checkpoint saved");
        Ok(())
    }
}

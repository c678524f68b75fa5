//! PostgreSQL checkpoint store.
//!
//! Same layout as the SQLite store, with the state in a `JSONB` column.
//! The table is created idempotently when the store connects.
//!
//! # Feature gate
//!
//! This module is behind the `postgres` feature flag (enabled by default).

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use toolchat_core::checkpoint::CheckpointStore;
use toolchat_core::error::CheckpointError;
use toolchat_core::message::SessionId;
use toolchat_core::state::ConversationState;
use tracing::{debug, info};

use crate::codec;

pub struct PostgresCheckpointStore {
    pool: PgPool,
}

impl PostgresCheckpointStore {
    /// Connect using a `postgres://` URL and create the schema if needed.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, CheckpointError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| CheckpointError::Unavailable(format!("PostgreSQL connection failed: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("Connected to PostgreSQL checkpoint store");
        Ok(store)
    }

    /// Create from an existing connection pool.
    pub async fn from_pool(pool: PgPool) -> Result<Self, CheckpointError> {
        let store = Self { pool };
        store.setup().await?;
        Ok(store)
    }

    async fn setup(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id   TEXT PRIMARY KEY,
                state       JSONB NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
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
impl CheckpointStore for PostgresCheckpointStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn load(&self, session: &SessionId) -> Result<ConversationState, CheckpointError> {
        let row = sqlx::query("SELECT state::text AS state FROM checkpoints WHERE thread_id = $1")
            .bind(session.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(format!("load {session}: {e}")))?;

        let Some(row) = row else {
            debug!(session_id = %session, "No checkpoint yet");
            return Ok(ConversationState::new());
        };
        let raw: String = row
            .try_get("state")
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        codec::decode(session, &raw)
    }

    async fn save(&self, session: &SessionId, state: &ConversationState) -> Result<(), CheckpointError> {
        let encoded = codec::encode(state)?;
        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, state, updated_at)
            VALUES ($1, $2::jsonb, now())
            ON CONFLICT (thread_id) DO UPDATE SET
                state = EXCLUDED.state,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(session.as_str())
        .bind(encoded)
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(format!("save {session}: {e}")))?;

        debug!(session_id = %session, messages = state.len(), "Checkpoint saved");
        Ok(())
    }
}

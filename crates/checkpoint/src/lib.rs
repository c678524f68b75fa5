//! Checkpoint stores for toolchat sessions.
//!
//! Every store implements `toolchat_core::CheckpointStore`. The backend is
//! chosen once at startup from the configured database URL; if a durable
//! backend cannot be reached then, [`connect_with_fallback`] degrades to the
//! in-memory store and logs a warning.

mod codec;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresCheckpointStore;

use std::sync::Arc;
use std::time::Duration;
use toolchat_config::CheckpointConfig;
use toolchat_core::checkpoint::CheckpointStore;
use toolchat_core::error::CheckpointError;
use tracing::{info, warn};

/// Which backend a database URL selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Sqlite,
    Postgres,
}

impl BackendKind {
    /// Classify a database URL. `None` means the scheme is not supported.
    pub fn from_url(url: Option<&str>) -> Option<Self> {
        let url = url.map(str::trim).unwrap_or_default();
        if url.is_empty() || url == "memory" || url == "memory://" {
            Some(Self::Memory)
        } else if url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else {
            None
        }
    }
}

/// Open the backend named by `config.database_url`.
pub async fn connect(config: &CheckpointConfig) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    let url = config.database_url.as_deref().unwrap_or_default();
    let timeout = Duration::from_secs(config.connect_timeout_secs);

    match BackendKind::from_url(Some(url)) {
        Some(BackendKind::Memory) => Ok(Arc::new(InMemoryCheckpointStore::new())),
        Some(BackendKind::Sqlite) => open_sqlite(url, timeout).await,
        Some(BackendKind::Postgres) => open_postgres(url, timeout).await,
        None => Err(CheckpointError::Unavailable(format!(
            "unsupported database URL scheme: {}",
            scheme_of(url)
        ))),
    }
}

/// Like [`connect`], but falls back to the in-memory store when allowed.
pub async fn connect_with_fallback(
    config: &CheckpointConfig,
) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    match connect(config).await {
        Ok(store) => {
            info!(backend = store.name(), "Checkpoint store ready");
            Ok(store)
        }
        Err(e) if config.fallback_to_memory => {
            warn!(
                error = %e,
                "Durable checkpoint store unavailable, falling back to in-memory; sessions will not survive a restart"
            );
            Ok(Arc::new(InMemoryCheckpointStore::new()))
        }
        Err(e) => Err(e),
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(url: &str, timeout: Duration) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    Ok(Arc::new(SqliteCheckpointStore::connect(url, timeout).await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_url: &str, _timeout: Duration) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    Err(CheckpointError::Unavailable("built without the `sqlite` feature".into()))
}

#[cfg(feature = "postgres")]
async fn open_postgres(url: &str, timeout: Duration) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    Ok(Arc::new(PostgresCheckpointStore::connect(url, timeout).await?))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_url: &str, _timeout: Duration) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    Err(CheckpointError::Unavailable("built without the `postgres` feature".into()))
}

/// Scheme only, so credentials never reach the logs.
fn scheme_of(url: &str) -> &str {
    url.split_once(':').map_or("<none>", |(scheme, _)| scheme)
}

//! Process-wide dependencies shared by every turn.

use std::sync::Arc;
use std::time::Duration;

use toolchat_checkpoint::connect_with_fallback;
use toolchat_config::AppConfig;
use toolchat_core::{CheckpointStore, Error, Provider, ToolRegistry};
use toolchat_providers::router::build_from_config;
use toolchat_tools::default_registry;
use tracing::info;

/// Knobs for one run of the agent loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Bound on DECIDING steps per turn
    pub max_iterations: u32,
    /// Applies to opening the stream and to every chunk wait
    pub model_timeout: Duration,
    pub max_model_retries: u32,
    pub retry_backoff: Duration,
    pub system_prompt: Option<String>,
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.max_tokens),
            max_iterations: config.agent.max_iterations,
            model_timeout: Duration::from_secs(config.agent.model_timeout_secs),
            max_model_retries: config.agent.max_model_retries,
            retry_backoff: Duration::from_millis(config.agent.retry_backoff_ms),
            system_prompt: config.agent.system_prompt.clone(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Provider, tools and checkpoint store, built once at startup and shared
/// read-only by every request.
#[derive(Clone)]
pub struct AppContext {
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub settings: LoopSettings,
}

impl AppContext {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            checkpoints,
            settings,
        }
    }

    /// Wire everything up from configuration.
    pub async fn build(config: &AppConfig) -> Result<Self, Error> {
        let provider = build_from_config(config)?;

        let tool_timeout = Duration::from_secs(config.agent.tool_timeout_secs);
        let tools = default_registry(&config.tools, tool_timeout)
            .map_err(|e| Error::Internal(format!("failed to build tool HTTP client: {e}")))?;

        let checkpoints = connect_with_fallback(&config.checkpoint).await?;

        info!(
            provider = provider.name(),
            model = %config.default_model,
            tools = ?tools.names(),
            checkpoint_backend = checkpoints.name(),
            "Agent context ready"
        );

        Ok(Self::new(
            provider,
            Arc::new(tools),
            checkpoints,
            LoopSettings::from_config(config),
        ))
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.names())
            .field("checkpoints", &self.checkpoints.name())
            .field("settings", &self.settings)
            .finish()
    }
}

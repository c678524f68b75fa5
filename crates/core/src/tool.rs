//! Tool trait and registry.
//!
//! Tools are the external capabilities the model may ask for (web search,
//! arithmetic, market data). The registry is the only dispatch path and it
//! never lets an error escape: every failure becomes an error payload that
//! goes back to the model as a tool message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::{Message, ToolRequest};
use crate::provider::ToolDefinition;

/// The outcome of one tool request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The request id this result answers
    pub call_id: String,

    /// Name of the tool that was requested
    pub name: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The tool's JSON value, or `{"error": "..."}` on failure
    pub payload: serde_json::Value,
}

impl ToolResult {
    pub fn success(request: &ToolRequest, payload: serde_json::Value) -> Self {
        Self {
            call_id: request.id.clone(),
            name: request.name.clone(),
            success: true,
            payload,
        }
    }

    pub fn failure(request: &ToolRequest, error: &ToolError) -> Self {
        Self {
            call_id: request.id.clone(),
            name: request.name.clone(),
            success: false,
            payload: json!({ "error": error.to_string() }),
        }
    }

    /// The tool message appended to the conversation for this result.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.name, self.payload.to_string())
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name the model uses to request this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool, returning a JSON-serializable value.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A fixed name → tool mapping, built once at startup.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
    call_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            call_timeout: None,
        }
    }

    /// Bound every dispatched call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Run a request, surfacing failures as `ToolError`.
    pub async fn execute(&self, request: &ToolRequest) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(&request.name)
            .ok_or_else(|| ToolError::NotFound(request.name.clone()))?;

        let call = tool.execute(request.arguments.clone());
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool_name: request.name.clone(),
                    timeout_secs: limit.as_secs(),
                })?,
            None => call.await,
        }
    }

    /// Run a request and fold any failure into an error payload.
    pub async fn dispatch(&self, request: &ToolRequest) -> ToolResult {
        match self.execute(request).await {
            Ok(payload) => {
                debug!(tool = %request.name, call_id = %request.id, "Tool succeeded");
                ToolResult::success(request, payload)
            }
            Err(e) => {
                warn!(tool = %request.name, call_id = %request.id, error = %e, "Tool failed");
                ToolResult::failure(request, &e)
            }
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

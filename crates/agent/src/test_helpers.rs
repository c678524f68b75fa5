//! Shared fixtures for loop and adapter tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use toolchat_checkpoint::InMemoryCheckpointStore;
use toolchat_core::error::{CheckpointError, ProviderError, ToolError};
use toolchat_core::message::{Message, SessionId, ToolRequest};
use toolchat_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use toolchat_core::state::ConversationState;
use toolchat_core::tool::{Tool, ToolRegistry};
use toolchat_core::CheckpointStore;
use toolchat_tools::calculator::CalculatorTool;

use crate::context::{AppContext, LoopSettings};
use crate::stream_event::StreamEvent;

/// One scripted model decision.
pub enum Step {
    /// Stream `fragments` one chunk each, then a final chunk with `tool_requests`.
    Reply {
        fragments: Vec<String>,
        tool_requests: Vec<ToolRequest>,
    },
    /// `stream()` itself fails.
    Fail(ProviderError),
    /// Stream `fragments`, then fail mid-stream.
    FailAfter {
        fragments: Vec<String>,
        error: ProviderError,
    },
    /// Open the stream and never send anything.
    Stall,
}

impl Step {
    pub fn text(fragments: &[&str]) -> Self {
        Self::Reply {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            tool_requests: Vec::new(),
        }
    }

    pub fn tools(tool_requests: Vec<ToolRequest>) -> Self {
        Self::Reply {
            fragments: Vec::new(),
            tool_requests,
        }
    }
}

/// A provider that plays back a fixed script and records every request.
///
/// Once the script runs out every call fails with a non-transient error.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("scripted provider only streams".into()))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        let Some(step) = step else {
            return Err(ProviderError::NotConfigured("script exhausted".into()));
        };

        let (tx, rx) = mpsc::channel(64);
        match step {
            Step::Fail(e) => return Err(e),
            Step::Reply {
                fragments,
                tool_requests,
            } => {
                tokio::spawn(async move {
                    for fragment in fragments {
                        let _ = tx.send(Ok(content_chunk(fragment))).await;
                    }
                    let _ = tx
                        .send(Ok(StreamChunk {
                            tool_requests,
                            done: true,
                            ..Default::default()
                        }))
                        .await;
                });
            }
            Step::FailAfter { fragments, error } => {
                tokio::spawn(async move {
                    for fragment in fragments {
                        let _ = tx.send(Ok(content_chunk(fragment))).await;
                    }
                    let _ = tx.send(Err(error)).await;
                });
            }
            Step::Stall => {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(tx);
                });
            }
        }
        Ok(rx)
    }
}

fn content_chunk(fragment: String) -> StreamChunk {
    StreamChunk {
        content: Some(fragment),
        ..Default::default()
    }
}

/// In-memory store that counts saves and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryCheckpointStore,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_saves() -> Self {
        let store = Self::default();
        store.fail_saves.store(true, Ordering::SeqCst);
        store
    }

    pub fn failing_loads() -> Self {
        let store = Self::default();
        store.fail_loads.store(true, Ordering::SeqCst);
        store
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn stored(&self, session: &str) -> ConversationState {
        self.inner.load(&SessionId::from(session)).await.unwrap()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.session_count().await
    }
}

#[async_trait]
impl CheckpointStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn load(&self, session: &SessionId) -> Result<ConversationState, CheckpointError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(CheckpointError::Unavailable("connection refused".into()));
        }
        self.inner.load(session).await
    }

    async fn save(&self, session: &SessionId, state: &ConversationState) -> Result<(), CheckpointError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::Storage("disk full".into()));
        }
        self.inner.save(session, state).await
    }
}

/// Returns `output` after `delay`.
pub struct DelayedTool {
    pub name: &'static str,
    pub delay: Duration,
    pub output: Value,
}

#[async_trait]
impl Tool for DelayedTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Answers after a fixed delay"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.output.clone())
    }
}

pub fn calculator_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool));
    registry
}

pub fn context(provider: Arc<ScriptedProvider>, store: Arc<CountingStore>, tools: ToolRegistry) -> AppContext {
    AppContext::new(provider, Arc::new(tools), store, test_settings())
}

pub fn test_settings() -> LoopSettings {
    LoopSettings {
        model: "test-model".into(),
        max_iterations: 5,
        model_timeout: Duration::from_secs(5),
        max_model_retries: 2,
        retry_backoff: Duration::from_millis(100),
        system_prompt: None,
        ..LoopSettings::default()
    }
}

pub fn calc_request(id: &str, a: f64, b: f64, op: &str) -> ToolRequest {
    ToolRequest::new(
        id,
        "calculator",
        json!({"first_num": a, "second_num": b, "operation": op}),
    )
}

pub async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// `checkpoint? (content|tool_output)* (loop_limit_exceeded|error)? end`
pub fn assert_grammar(events: &[StreamEvent]) {
    let (last, body) = events.split_last().expect("stream must not be empty");
    assert!(last.is_end(), "last event must be end, got {last:?}");

    let mut body = body;
    if let Some((StreamEvent::Checkpoint { .. }, rest)) = body.split_first() {
        body = rest;
    }
    if let Some((StreamEvent::LoopLimitExceeded { .. } | StreamEvent::Error { .. }, rest)) =
        body.split_last()
    {
        body = rest;
    }
    for event in body {
        assert!(
            matches!(event, StreamEvent::Content { .. } | StreamEvent::ToolOutput { .. }),
            "unexpected {} event in stream body",
            event.event_type()
        );
    }
}

pub fn text_of(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Content { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

pub fn user_turn(text: &str) -> ConversationState {
    let mut state = ConversationState::new();
    state.merge([Message::user(text)]).unwrap();
    state
}

/// Frame each payload as an SSE `data:` event.
pub fn sse_body(payloads: &[&str]) -> String {
    payloads.iter().map(|p| format!("data: {p}\n\n")).collect()
}

/// A chat-completions endpoint that answers the n-th call with `bodies[n]`,
/// repeating the last body once the list runs out. Returns the base URL and
/// a call counter.
pub async fn sse_server(bodies: Vec<String>) -> (String, Arc<AtomicUsize>) {
    use axum::{Router, http::header, routing::post};

    let bodies = Arc::new(bodies);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let bodies = bodies.clone();
            let calls = counter.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let body = bodies[n.min(bodies.len() - 1)].clone();
                ([(header::CONTENT_TYPE, "text/event-stream")], body)
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), calls)
}

/// A context backed by the real OpenAI-compatible provider pointed at `base_url`.
pub fn http_context(base_url: &str, store: Arc<CountingStore>) -> AppContext {
    let provider = toolchat_providers::OpenAiCompatProvider::new("mock", base_url, "test-key").unwrap();
    let mut settings = test_settings();
    settings.retry_backoff = Duration::from_millis(10);
    AppContext::new(Arc::new(provider), Arc::new(calculator_registry()), store, settings)
}

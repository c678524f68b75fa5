//! The decide/act state machine that drives one turn.
//!
//! ```text
//!   DECIDING ──tool requests──▶ ACTING
//!      ▲                          │
//!      └──────────────────────────┘
//!   DECIDING ──no tool requests──▶ DONE
//! ```
//!
//! The loop streams content and tool outputs into an [`EventSink`] as they
//! happen and saves the state after every ACTING step and at DONE.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::timeout;
use toolchat_core::error::{Error, ProviderError, StateError};
use toolchat_core::message::{Message, SessionId, ToolRequest};
use toolchat_core::provider::ProviderRequest;
use toolchat_core::state::ConversationState;
use toolchat_core::tool::ToolResult;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::sink::EventSink;
use crate::stream_event::{StreamEvent, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Deciding,
    Acting,
    Done,
}

/// How a loop execution ended.
#[derive(Debug)]
pub enum LoopOutcome {
    /// The model answered without requesting tools.
    Completed { iterations: u32 },
    /// Another decision was needed but the bound was already spent.
    LimitReached { max_iterations: u32 },
    /// The model could not be reached, even after retries.
    Failed(Error),
}

/// One execution of the agent loop against a shared [`AppContext`].
pub struct AgentLoop<'a> {
    ctx: &'a AppContext,
    persist: bool,
}

impl<'a> AgentLoop<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx, persist: true }
    }

    /// Disable checkpoint writes, e.g. when the prior state could not be loaded.
    pub fn with_persistence(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Run from DECIDING until DONE, the iteration bound, or a model failure.
    ///
    /// `state` must already contain the new user message.
    pub async fn run(
        &self,
        session: &SessionId,
        state: &mut ConversationState,
        sink: &mut EventSink,
    ) -> LoopOutcome {
        let max_iterations = self.ctx.settings.max_iterations;
        let mut iterations = 0u32;
        let mut phase = Phase::Deciding;

        loop {
            match phase {
                Phase::Deciding => {
                    if iterations >= max_iterations {
                        // ACTING just saved, nothing new to persist.
                        warn!(session = %session, max_iterations, "Loop limit reached");
                        return LoopOutcome::LimitReached { max_iterations };
                    }
                    iterations += 1;
                    debug!(session = %session, iteration = iterations, "Deciding");

                    let message = match self.decide(state, sink).await {
                        Ok(message) => message,
                        Err(e) => {
                            self.persist(session, state).await;
                            return LoopOutcome::Failed(e.into());
                        }
                    };
                    let wants_tools = message.has_tool_requests();
                    if let Err(e) = state.merge([message]) {
                        self.persist(session, state).await;
                        return LoopOutcome::Failed(e.into());
                    }
                    phase = if wants_tools { Phase::Acting } else { Phase::Done };
                }
                Phase::Acting => {
                    if let Err(e) = self.act(state, sink).await {
                        self.persist(session, state).await;
                        return LoopOutcome::Failed(e.into());
                    }
                    self.persist(session, state).await;
                    phase = Phase::Deciding;
                }
                Phase::Done => {
                    self.persist(session, state).await;
                    info!(session = %session, iterations, messages = state.len(), "Turn complete");
                    return LoopOutcome::Completed { iterations };
                }
            }
        }
    }

    /// Ask the model for the next assistant message, retrying transient
    /// failures as long as nothing has been streamed to the client yet.
    async fn decide(
        &self,
        state: &ConversationState,
        sink: &mut EventSink,
    ) -> Result<Message, ProviderError> {
        let settings = &self.ctx.settings;
        let mut attempt = 0u32;

        loop {
            let mut emitted = false;
            match self.stream_once(self.build_request(state), sink, &mut emitted).await {
                Ok(message) => return Ok(message),
                Err(e) if e.is_transient() && !emitted && attempt < settings.max_model_retries => {
                    attempt += 1;
                    let delay = backoff(settings.retry_backoff, attempt);
                    warn!(
                        provider = self.ctx.provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(provider = self.ctx.provider.name(), attempt, error = %e, "Model call failed");
                    return Err(e);
                }
            }
        }
    }

    fn build_request(&self, state: &ConversationState) -> ProviderRequest {
        let settings = &self.ctx.settings;
        let mut messages = Vec::with_capacity(state.len() + 1);
        if let Some(prompt) = &settings.system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.extend(state.messages().iter().cloned());

        ProviderRequest {
            model: settings.model.clone(),
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            tools: self.ctx.tools.definitions(),
            stream: true,
        }
    }

    /// One streamed model call. Every chunk wait is bounded by the model timeout.
    async fn stream_once(
        &self,
        request: ProviderRequest,
        sink: &mut EventSink,
        emitted: &mut bool,
    ) -> Result<Message, ProviderError> {
        let limit = self.ctx.settings.model_timeout;
        let mut rx = timeout(limit, self.ctx.provider.stream(request))
            .await
            .map_err(|_| timed_out(limit))??;

        let mut content = String::new();
        let mut tool_requests = Vec::new();
        loop {
            let chunk = timeout(limit, rx.recv())
                .await
                .map_err(|_| timed_out(limit))?
                .ok_or_else(|| {
                    ProviderError::StreamInterrupted("stream closed before completion".into())
                })??;

            if let Some(fragment) = chunk.content.filter(|f| !f.is_empty()) {
                content.push_str(&fragment);
                *emitted = true;
                sink.emit(StreamEvent::Content { content: fragment }).await;
            }
            tool_requests.extend(chunk.tool_requests);
            if chunk.done {
                break;
            }
        }

        Ok(Message::assistant_with_tools(content, normalize_ids(tool_requests)))
    }

    /// Resolve every pending tool request concurrently. Outputs are emitted as
    /// they complete; result messages are merged in request order.
    async fn act(&self, state: &mut ConversationState, sink: &mut EventSink) -> Result<(), StateError> {
        let requests: Vec<ToolRequest> = state.pending_tool_requests().into_iter().cloned().collect();
        debug!(count = requests.len(), "Executing tool requests");

        let tools = &self.ctx.tools;
        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| async move { (index, tools.dispatch(request).await) })
            .collect();

        let mut slots: Vec<Option<ToolResult>> = requests.iter().map(|_| None).collect();
        while let Some((index, result)) = pending.next().await {
            sink.emit(StreamEvent::ToolOutput {
                output: ToolOutput::from(&result),
            })
            .await;
            slots[index] = Some(result);
        }

        state.merge(slots.into_iter().flatten().map(|result| result.to_message()))
    }

    async fn persist(&self, session: &SessionId, state: &ConversationState) {
        if !self.persist {
            return;
        }
        let store = &self.ctx.checkpoints;
        match store.save(session, state).await {
            Ok(()) => debug!(session = %session, backend = store.name(), messages = state.len(), "Checkpoint saved"),
            Err(e) => error!(session = %session, backend = store.name(), error = %e, "Failed to save checkpoint"),
        }
    }
}

fn timed_out(limit: Duration) -> ProviderError {
    ProviderError::Timeout(format!("no response from model within {}s", limit.as_secs()))
}

/// `base * 2^(attempt - 1)`
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// Give empty or repeated request ids a fresh one so every result can be
/// matched back to exactly one request.
fn normalize_ids(requests: Vec<ToolRequest>) -> Vec<ToolRequest> {
    let mut seen = HashSet::new();
    requests
        .into_iter()
        .map(|mut request| {
            if request.id.is_empty() || !seen.insert(request.id.clone()) {
                request.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                seen.insert(request.id.clone());
            }
            request
        })
        .collect()
}

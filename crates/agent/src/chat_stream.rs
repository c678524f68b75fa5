//! Turns one user message into a stream of events.
//!
//! The adapter resolves the session, loads its state, appends the user
//! message, drives [`AgentLoop`] and maps the outcome onto the event grammar.
//! The work runs in its own task: when the client disconnects, emitting stops
//! but the turn still finishes and its checkpoint is written.

use std::sync::Arc;

use tokio::sync::mpsc;
use toolchat_core::message::{Message, SessionId};
use toolchat_core::state::ConversationState;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::loop_runner::{AgentLoop, LoopOutcome};
use crate::sink::EventSink;
use crate::stream_event::StreamEvent;

const EVENT_BUFFER: usize = 128;

/// Spawn a turn and return its event stream. The stream always ends with `end`
/// unless the receiver is dropped first.
pub fn start(ctx: Arc<AppContext>, message: String, checkpoint_id: Option<String>) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        run(&ctx, message, checkpoint_id, EventSink::new(tx)).await;
    });
    rx
}

/// Run one turn to completion, emitting into `sink`.
pub async fn run(ctx: &AppContext, message: String, checkpoint_id: Option<String>, mut sink: EventSink) {
    let (session, is_new) = match checkpoint_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => (SessionId(id), false),
        None => (SessionId::new(), true),
    };
    info!(session = %session, new_session = is_new, "Turn started");

    let (mut state, persist) = if is_new {
        sink.emit(StreamEvent::Checkpoint {
            checkpoint_id: session.to_string(),
        })
        .await;
        (ConversationState::new(), true)
    } else {
        match ctx.checkpoints.load(&session).await {
            Ok(state) => (state, true),
            Err(e) => {
                // Don't overwrite a snapshot we failed to read.
                error!(
                    session = %session,
                    backend = ctx.checkpoints.name(),
                    error = %e,
                    "Failed to load checkpoint, continuing without persistence"
                );
                (ConversationState::new(), false)
            }
        }
    };

    if let Err(e) = state.merge([Message::user(message)]) {
        error!(session = %session, error = %e, "Stored conversation cannot accept a new message");
        sink.emit(StreamEvent::Error {
            message: e.to_string(),
        })
        .await;
        sink.emit(StreamEvent::End).await;
        return;
    }

    let outcome = AgentLoop::new(ctx)
        .with_persistence(persist)
        .run(&session, &mut state, &mut sink)
        .await;

    match outcome {
        LoopOutcome::Completed { iterations } => {
            info!(session = %session, iterations, "Turn finished");
        }
        LoopOutcome::LimitReached { max_iterations } => {
            sink.emit(StreamEvent::LoopLimitExceeded { max_iterations }).await;
        }
        LoopOutcome::Failed(e) => {
            warn!(session = %session, error = %e, "Turn failed");
            sink.emit(StreamEvent::Error {
                message: e.to_string(),
            })
            .await;
        }
    }
    sink.emit(StreamEvent::End).await;

    if !sink.is_connected() {
        info!(session = %session, "Client left before the turn ended");
    }
}

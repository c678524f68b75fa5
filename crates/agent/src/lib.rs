//! The toolchat agent: the decide/act loop and its event stream.
//!
//! One turn goes through three pieces:
//!
//! 1. [`chat_stream`] resolves the session, loads its state and appends the
//!    user message
//! 2. [`AgentLoop`] alternates model decisions and tool execution until the
//!    model stops requesting tools
//! 3. every step is reported as a [`StreamEvent`], ending with `end`
//!
//! Everything a turn needs lives in an [`AppContext`] built once at startup.

pub mod chat_stream;
pub mod context;
pub mod loop_runner;
pub mod sink;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{AppContext, LoopSettings};
pub use loop_runner::{AgentLoop, LoopOutcome};
pub use sink::EventSink;
pub use stream_event::{StreamEvent, ToolOutput, encode_frame};

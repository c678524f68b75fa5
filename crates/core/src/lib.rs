//! # toolchat core
//!
//! Domain types, traits, and error definitions for the toolchat agent.
//! This crate has no framework dependencies; every other crate implements
//! against the traits defined here:
//! - [`Provider`] for model backends
//! - [`Tool`] and [`ToolRegistry`] for capabilities the model can invoke
//! - [`CheckpointStore`] for per-session persistence

pub mod checkpoint;
pub mod error;
pub mod message;
pub mod provider;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use checkpoint::CheckpointStore;
pub use error::{CheckpointError, Error, ProviderError, Result, StateError, ToolError};
pub use message::{Message, Role, SessionId, ToolRequest};
pub use provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage,
};
pub use state::ConversationState;
pub use tool::{Tool, ToolRegistry, ToolResult};

//! Model provider implementations for toolchat.
//!
//! All providers implement the `toolchat_core::Provider` trait.
//! `build_from_config` selects the configured backend.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, default_base_url};

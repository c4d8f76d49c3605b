//! llm-playground is a small workbench for experimenting with chat-style prompting.
//!
//! # Overview
//! A user picks a model and its sampling parameters, types a prompt (optionally
//! with a system message) and submits it. The assembled conversation is sent to
//! an OpenAI-compatible chat completions endpoint and the reply is recorded as a
//! numbered turn. Turns flagged as memory are replayed as context on later
//! submissions.
//!
//! # Architecture
//! - [`chat`]: message types and the [`chat::ChatProvider`] seam
//! - [`backends`]: the OpenAI client and the offline debugging backend
//! - [`models`]: the catalog of selectable models
//! - [`settings`]: sampling chains, ranges and memory toggles
//! - [`session`]: the turn/session state machine
//! - [`playground`]: ties settings, session and provider together

// Re-export for convenience
pub use async_trait::async_trait;

/// Backend implementations (OpenAI, offline debugging)
pub mod backends;

/// Chat-based interactions with language models
pub mod chat;

/// Configuration file and connection settings
pub mod config;

/// Error types and handling
pub mod error;

/// Catalog of selectable models
pub mod models;

/// Orchestration of a single playground
pub mod playground;

/// Turn numbering, history and memory replay
pub mod session;

/// Model parameters selected by the user
pub mod settings;

pub use error::LLMError;
pub use playground::Playground;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
/// This is a no-op if the feature is not enabled.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}

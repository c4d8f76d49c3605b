//! Offline backend for the `develop-debugging` model.
//!
//! No request leaves the machine: the reply is whatever text the user typed
//! as the expected model response.

use std::fmt;

use async_trait::async_trait;

use crate::{
    chat::{ChatMessage, ChatProvider, ChatResponse},
    error::LLMError,
};

#[derive(Debug, Clone, Default)]
pub struct Debugging {
    response: String,
}

impl Debugging {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[derive(Debug)]
pub struct DebuggingResponse {
    text: String,
}

impl ChatResponse for DebuggingResponse {
    fn text(&self) -> Option<String> {
        Some(self.text.clone())
    }
}

impl fmt::Display for DebuggingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[async_trait]
impl ChatProvider for Debugging {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
        if log::log_enabled!(log::Level::Debug) {
            for m in messages {
                log::debug!("develop-debugging {}: {}", m.role.as_str(), m.content);
            }
        }
        Ok(Box::new(DebuggingResponse {
            text: self.response.clone(),
        }))
    }
}

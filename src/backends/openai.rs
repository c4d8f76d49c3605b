//! OpenAI chat completions client.
//!
//! Sampling models receive `temperature`/`top_p`, reasoning models receive
//! `reasoning_effort`. The caller decides which by passing `None` for the rest.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::{
    chat::{ChatMessage, ChatProvider, ChatResponse, ReasoningEffort, Usage},
    error::LLMError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const CHAT_ENDPOINT: &str = "chat/completions";

/// Client for one model with fixed request parameters.
#[derive(Debug, Clone)]
pub struct OpenAI {
    api_key: String,
    pub base_url: Url,
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub timeout_seconds: Option<u64>,
    client: Client,
}

#[derive(Serialize, Debug)]
struct OpenAIChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<ReasoningEffort>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
pub struct OpenAIChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ChatResponse for OpenAIChatResponse {
    fn text(&self) -> Option<String> {
        self.choices.first().and_then(|c| c.message.content.clone())
    }

    fn usage(&self) -> Option<Usage> {
        self.usage.clone()
    }
}

impl fmt::Display for OpenAIChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text().unwrap_or_default())
    }
}

impl OpenAI {
    /// Creates a new OpenAI client.
    ///
    /// `base_url` defaults to [`DEFAULT_BASE_URL`]; a missing trailing slash is added.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: impl Into<String>,
        temperature: Option<f32>,
        top_p: Option<f32>,
        reasoning_effort: Option<ReasoningEffort>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, LLMError> {
        let mut base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| LLMError::InvalidRequest(format!("Invalid base URL '{base}': {e}")))?;

        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(sec));
        }

        Ok(Self {
            api_key: api_key.into(),
            base_url,
            model: model.into(),
            temperature,
            top_p,
            reasoning_effort,
            timeout_seconds,
            client: builder.build()?,
        })
    }

    fn request_body<'a>(&'a self, messages: &'a [ChatMessage]) -> OpenAIChatRequest<'a> {
        OpenAIChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAIChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            temperature: self.temperature,
            top_p: self.top_p,
            reasoning_effort: self.reasoning_effort,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAI {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
        if self.api_key.is_empty() {
            return Err(LLMError::AuthError("Missing OpenAI API key".to_string()));
        }

        let body = self.request_body(messages);

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("OpenAI request payload: {json}");
            }
        }

        let url = self
            .base_url
            .join(CHAT_ENDPOINT)
            .map_err(|e| LLMError::HttpError(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        log::debug!("OpenAI HTTP status: {}", response.status());

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(LLMError::ResponseFormatError {
                message: format!("OpenAI API returned error status: {status}"),
                raw_response: error_text,
            });
        }

        let resp_text = response.text().await?;
        match serde_json::from_str::<OpenAIChatResponse>(&resp_text) {
            Ok(parsed) => Ok(Box::new(parsed)),
            Err(e) => Err(LLMError::ResponseFormatError {
                message: format!("Failed to decode OpenAI API response: {e}"),
                raw_response: resp_text,
            }),
        }
    }
}

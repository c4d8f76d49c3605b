use std::str::FromStr;

use crate::{
    backends::{debugging::Debugging, openai::OpenAI},
    chat::ChatProvider,
    config::Connection,
    error::LLMError,
    settings::Settings,
};

/// Message shown when a remote model is selected without credentials.
pub const MISSING_API_KEY: &str = "Please, configure the OpenAI API key (OPENAI_API_KEY).";

/// Models offered by the playground, in the order they are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Models {
    #[default]
    Gpt4o,
    Gpt4oMini,
    O1,
    O3Mini,
    /// Offline mode: the user types the expected model response.
    DevelopDebugging,
}

impl Models {
    pub const ALL: [Models; 5] = [
        Models::Gpt4o,
        Models::Gpt4oMini,
        Models::O1,
        Models::O3Mini,
        Models::DevelopDebugging,
    ];

    /// Model identifier as sent to the API.
    pub fn name(&self) -> &'static str {
        match self {
            Models::Gpt4o => "gpt-4o",
            Models::Gpt4oMini => "gpt-4o-mini",
            Models::O1 => "o1",
            Models::O3Mini => "o3-mini",
            Models::DevelopDebugging => "develop-debugging",
        }
    }

    /// Reasoning models take a reasoning effort instead of sampling parameters.
    pub fn is_reasoning(&self) -> bool {
        matches!(self, Models::O1 | Models::O3Mini)
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, Models::DevelopDebugging)
    }

    /// Builds the provider that serves this model under the given settings.
    ///
    /// `expected_response` is only consulted by [`Models::DevelopDebugging`].
    pub fn to_provider(
        &self,
        settings: &Settings,
        connection: &Connection,
        expected_response: Option<String>,
    ) -> Result<Box<dyn ChatProvider>, LLMError> {
        if !self.is_remote() {
            return Ok(Box::new(Debugging::new(expected_response.unwrap_or_default())));
        }

        let api_key = connection
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LLMError::AuthError(MISSING_API_KEY.to_string()))?;

        let (temperature, top_p, reasoning_effort) = if self.is_reasoning() {
            (None, None, Some(settings.reasoning_effort))
        } else {
            (Some(settings.temperature()), Some(settings.top_p()), None)
        };

        Ok(Box::new(OpenAI::new(
            api_key,
            connection.base_url.clone(),
            self.name(),
            temperature,
            top_p,
            reasoning_effort,
            connection.timeout_seconds,
        )?))
    }
}

impl std::fmt::Display for Models {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Models {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Models::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| {
                LLMError::InvalidRequest(format!(
                    "Unknown model '{s}', expected one of: {}",
                    Models::ALL.map(|m| m.name()).join(", ")
                ))
            })
    }
}

impl serde::Serialize for Models {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for Models {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

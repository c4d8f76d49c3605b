//! Model parameters selected by the user.
//!
//! Sampling parameters are constrained by the active [`Chain`]: each chain
//! carries its own temperature/top_p ranges and defaults, and switching chains
//! resets both values to the new chain's defaults.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{chat::ReasoningEffort, error::LLMError, models::Models};

/// Sampling preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    /// Near-deterministic sampling
    #[default]
    TopProbability,
    /// Creative sampling
    HighTemperature,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::TopProbability, Chain::HighTemperature];

    /// Name shown to the user and recorded in turn metadata.
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::TopProbability => "Top Probability",
            Chain::HighTemperature => "High Temperature",
        }
    }

    pub fn temperature_range(&self) -> RangeInclusive<f32> {
        match self {
            Chain::TopProbability => 0.0..=0.8,
            Chain::HighTemperature => 0.8..=2.0,
        }
    }

    pub fn top_p_range(&self) -> RangeInclusive<f32> {
        0.1..=1.0
    }

    pub fn default_temperature(&self) -> f32 {
        match self {
            Chain::TopProbability => 0.0,
            Chain::HighTemperature => 1.0,
        }
    }

    pub fn default_top_p(&self) -> f32 {
        match self {
            Chain::TopProbability => 0.2,
            Chain::HighTemperature => 0.1,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Chain {
    type Err = LLMError;

    /// Accepts "top-probability", "top_probability", "Top Probability", "top", "high", ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match normalized.as_str() {
            "top-probability" | "top" => Ok(Chain::TopProbability),
            "high-temperature" | "high" => Ok(Chain::HighTemperature),
            _ => Err(LLMError::InvalidRequest(format!(
                "Unknown chain '{s}', expected 'top-probability' or 'high-temperature'"
            ))),
        }
    }
}

/// Everything the user configures before submitting a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: Models,
    chain: Chain,
    temperature: f32,
    top_p: f32,
    /// Replay memory turns and flag new turns as memory
    pub write_memory: bool,
    /// Replay memory turns but never flag new turns as memory
    pub read_only_memory: bool,
    pub system_enabled: bool,
    pub system_message: String,
    /// Only sent to reasoning models
    pub reasoning_effort: ReasoningEffort,
}

impl Default for Settings {
    fn default() -> Self {
        let chain = Chain::default();
        Self {
            model: Models::default(),
            chain,
            temperature: chain.default_temperature(),
            top_p: chain.default_top_p(),
            write_memory: false,
            read_only_memory: false,
            system_enabled: false,
            system_message: String::new(),
            reasoning_effort: ReasoningEffort::default(),
        }
    }
}

impl Settings {
    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    /// Switches the sampling chain. Temperature and top_p go back to the
    /// chain defaults even when the chain does not change.
    pub fn set_chain(&mut self, chain: Chain) {
        log::debug!("switching chain to {chain}");
        self.chain = chain;
        self.temperature = chain.default_temperature();
        self.top_p = chain.default_top_p();
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), LLMError> {
        check_range("temperature", temperature, self.chain.temperature_range(), self.chain)?;
        self.temperature = temperature;
        Ok(())
    }

    pub fn set_top_p(&mut self, top_p: f32) -> Result<(), LLMError> {
        check_range("top_p", top_p, self.chain.top_p_range(), self.chain)?;
        self.top_p = top_p;
        Ok(())
    }

    /// Enables the system message with the given text.
    pub fn set_system_message(&mut self, message: impl Into<String>) {
        self.system_enabled = true;
        self.system_message = message.into();
    }

    pub fn disable_system_message(&mut self) {
        self.system_enabled = false;
    }

    /// The system message to prepend, if enabled.
    pub fn system(&self) -> Option<&str> {
        self.system_enabled.then_some(self.system_message.as_str())
    }

    /// Whether a turn submitted now is flagged as memory for later replay.
    pub fn stores_memory(&self) -> bool {
        self.write_memory && !self.read_only_memory
    }

    /// Re-checks the sampling values against the active chain.
    pub fn validate(&self) -> Result<(), LLMError> {
        check_range("temperature", self.temperature, self.chain.temperature_range(), self.chain)?;
        check_range("top_p", self.top_p, self.chain.top_p_range(), self.chain)
    }
}

fn check_range(
    name: &str,
    value: f32,
    range: RangeInclusive<f32>,
    chain: Chain,
) -> Result<(), LLMError> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(LLMError::InvalidRequest(format!(
            "{name} {value} is outside {:.1}..={:.1} for the {chain} chain",
            range.start(),
            range.end()
        )))
    }
}

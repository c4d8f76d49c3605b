use chrono::Local;
use serde::{Deserialize, Serialize, Serializer};

use crate::settings::Settings;

/// Format of the turn timestamp, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Settings in effect when a turn was answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub model_name: String,
    pub chain: String,
    pub temperature: f32,
    pub top_p: f32,
    /// Whether later turns may replay this one as context
    pub memory: bool,
    pub timestamp: String,
    /// System message text, empty when disabled
    pub system: String,
}

impl TurnMetadata {
    /// Snapshots the settings at the current local time.
    pub fn capture(settings: &Settings) -> Self {
        Self {
            model_name: settings.model.name().to_string(),
            chain: settings.chain().display_name().to_string(),
            temperature: settings.temperature(),
            top_p: settings.top_p(),
            memory: settings.stores_memory(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            system: settings.system().unwrap_or_default().to_string(),
        }
    }
}

/// One answered exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub human: String,
    pub ai: String,
    pub metadata: TurnMetadata,
}

/// A numbered history entry.
///
/// A slot is created `Pending` as soon as a prompt is submitted and only
/// becomes `Complete` once the model answered.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnSlot {
    Pending,
    Complete(Turn),
}

impl TurnSlot {
    pub fn turn(&self) -> Option<&Turn> {
        match self {
            TurnSlot::Pending => None,
            TurnSlot::Complete(turn) => Some(turn),
        }
    }

    /// Completed turns flagged as memory.
    pub fn is_memory(&self) -> bool {
        self.turn().is_some_and(|t| t.metadata.memory)
    }
}

impl Serialize for TurnSlot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TurnSlot::Pending => {
                use serde::ser::SerializeMap;
                serializer.serialize_map(Some(0))?.end()
            }
            TurnSlot::Complete(turn) => turn.serialize(serializer),
        }
    }
}

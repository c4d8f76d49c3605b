//! Turn numbering, history and memory replay.
//!
//! A [`Session`] hands out turn numbers from a counter starting at zero. The
//! first submission becomes turn 1. Every submission gets a history slot,
//! answered or not, and completed turns remember whether they may be replayed
//! as context by later submissions.

mod turn;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::{chat::ChatMessage, error::LLMError, settings::Settings};

pub use turn::{Turn, TurnMetadata, TurnSlot, TIMESTAMP_FORMAT};

/// File name suggested for history exports.
pub const DEFAULT_EXPORT_FILE: &str = "chat_history.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Next value the counter hands out
    counter: u64,
    current_turn: u64,
    history: BTreeMap<u64, TurnSlot>,
    /// Prompt of the turn in flight
    request: Option<String>,
    output: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let mut session = Self {
            counter: 0,
            current_turn: 0,
            history: BTreeMap::new(),
            request: None,
            output: String::new(),
        };
        session.current_turn = session.next_count();
        session
    }

    /// Drops all turns and restarts numbering.
    pub fn reset(&mut self) {
        log::debug!("resetting session after {} turns", self.history.len());
        *self = Self::new();
    }

    fn next_count(&mut self) -> u64 {
        let value = self.counter;
        self.counter += 1;
        value
    }

    /// Number of the last submitted turn, 0 before the first submission.
    pub fn current_turn(&self) -> u64 {
        self.current_turn
    }

    /// Number shown on the input prompt ("Turn N input").
    pub fn next_turn_label(&self) -> u64 {
        self.current_turn + 1
    }

    /// Response of the last completed turn.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn pending_request(&self) -> Option<&str> {
        self.request.as_deref()
    }

    pub fn history(&self) -> impl Iterator<Item = (u64, &TurnSlot)> {
        self.history.iter().map(|(n, slot)| (*n, slot))
    }

    pub fn turn(&self, number: u64) -> Option<&Turn> {
        self.history.get(&number).and_then(TurnSlot::turn)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of completed turns flagged as memory.
    pub fn memory_turns(&self) -> usize {
        self.history.values().filter(|slot| slot.is_memory()).count()
    }

    /// Submits a prompt: advances the counter and opens a pending slot.
    pub fn begin_turn(&mut self, prompt: impl Into<String>) -> u64 {
        self.current_turn = self.next_count();
        self.history.insert(self.current_turn, TurnSlot::Pending);
        self.request = Some(prompt.into());
        log::debug!("turn {} submitted", self.current_turn);
        self.current_turn
    }

    /// Assembles the conversation for the turn in flight.
    ///
    /// Order: system message (if enabled), then the human/ai pairs of every
    /// earlier memory turn (only when memory is on), then the current prompt.
    pub fn context_messages(&self, settings: &Settings) -> Result<Vec<ChatMessage>, LLMError> {
        let request = self
            .request
            .as_deref()
            .ok_or_else(|| LLMError::InvalidRequest("no turn has been submitted".into()))?;

        let mut messages = Vec::new();
        if let Some(system) = settings.system() {
            messages.push(ChatMessage::system().content(system).build());
        }

        if settings.write_memory && self.current_turn > 1 {
            for turn in self
                .history
                .range(..self.current_turn)
                .filter_map(|(_, slot)| slot.turn())
                .filter(|turn| turn.metadata.memory)
            {
                messages.push(ChatMessage::user().content(turn.human.as_str()).build());
                messages.push(ChatMessage::assistant().content(turn.ai.as_str()).build());
            }
        }

        messages.push(ChatMessage::user().content(request).build());
        Ok(messages)
    }

    /// Records the answer for the turn in flight.
    pub fn complete_turn(
        &mut self,
        output: impl Into<String>,
        metadata: TurnMetadata,
    ) -> Result<&Turn, LLMError> {
        let human = self
            .request
            .take()
            .ok_or_else(|| LLMError::InvalidRequest("no turn has been submitted".into()))?;
        let ai = output.into();
        self.output = ai.clone();

        self.history.insert(
            self.current_turn,
            TurnSlot::Complete(Turn {
                human,
                ai,
                metadata,
            }),
        );
        self.history
            .get(&self.current_turn)
            .and_then(TurnSlot::turn)
            .ok_or_else(|| LLMError::Generic(format!("turn {} was not recorded", self.current_turn)))
    }

    /// Gives up on the turn in flight. Its number stays consumed and its slot
    /// stays pending, so it is never replayed.
    pub fn abandon_turn(&mut self) {
        if self.request.take().is_some() {
            log::warn!("turn {} left without a response", self.current_turn);
        }
    }

    /// The history as a JSON object keyed `turn_<n>`.
    pub fn to_json(&self) -> Result<String, LLMError> {
        Ok(serde_json::to_string_pretty(&HistoryExport(&self.history))?)
    }

    /// Writes the history JSON to `path`.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), LLMError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        log::info!("exported {} turns to {}", self.history.len(), path.display());
        Ok(())
    }
}

struct HistoryExport<'a>(&'a BTreeMap<u64, TurnSlot>);

impl Serialize for HistoryExport<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (number, slot) in self.0 {
            map.serialize_entry(&format!("turn_{number}"), slot)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatRole;
    use serde_json::Value;

    fn answer(session: &mut Session, settings: &Settings, prompt: &str, reply: &str) {
        session.begin_turn(prompt);
        session
            .complete_turn(reply, TurnMetadata::capture(settings))
            .unwrap();
    }

    fn roles_and_contents(messages: &[ChatMessage]) -> Vec<(ChatRole, &str)> {
        messages.iter().map(|m| (m.role, m.content.as_str())).collect()
    }

    #[test]
    fn test_numbering_starts_at_one() {
        let mut session = Session::new();
        assert_eq!(session.current_turn(), 0);
        assert_eq!(session.next_turn_label(), 1);
        assert_eq!(session.begin_turn("hi"), 1);
        assert_eq!(session.next_turn_label(), 2);
        assert_eq!(session.turn(1), None);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_without_memory_only_current_prompt_is_sent() {
        let settings = Settings::default();
        let mut session = Session::new();
        answer(&mut session, &settings, "first", "one");

        session.begin_turn("second");
        let messages = session.context_messages(&settings).unwrap();
        assert_eq!(roles_and_contents(&messages), vec![(ChatRole::User, "second")]);
    }

    #[test]
    fn test_memory_replays_memory_turns_in_order() {
        let mut settings = Settings::default();
        settings.write_memory = true;
        let mut session = Session::new();
        answer(&mut session, &settings, "first", "one");
        answer(&mut session, &settings, "second", "two");

        session.begin_turn("third");
        let messages = session.context_messages(&settings).unwrap();
        assert_eq!(
            roles_and_contents(&messages),
            vec![
                (ChatRole::User, "first"),
                (ChatRole::Assistant, "one"),
                (ChatRole::User, "second"),
                (ChatRole::Assistant, "two"),
                (ChatRole::User, "third"),
            ]
        );
    }

    #[test]
    fn test_turns_recorded_without_memory_are_never_replayed() {
        let mut settings = Settings::default();
        let mut session = Session::new();
        answer(&mut session, &settings, "forgotten", "gone");

        settings.write_memory = true;
        answer(&mut session, &settings, "kept", "stays");

        session.begin_turn("now");
        let messages = session.context_messages(&settings).unwrap();
        assert_eq!(
            roles_and_contents(&messages),
            vec![
                (ChatRole::User, "kept"),
                (ChatRole::Assistant, "stays"),
                (ChatRole::User, "now"),
            ]
        );
    }

    #[test]
    fn test_read_only_memory_reads_but_does_not_write() {
        let mut settings = Settings::default();
        settings.write_memory = true;
        let mut session = Session::new();
        answer(&mut session, &settings, "first", "one");

        settings.read_only_memory = true;
        session.begin_turn("peek");
        let messages = session.context_messages(&settings).unwrap();
        assert_eq!(messages.len(), 3);
        let turn = session
            .complete_turn("seen", TurnMetadata::capture(&settings))
            .unwrap();
        assert!(!turn.metadata.memory);

        settings.read_only_memory = false;
        session.begin_turn("again");
        let messages = session.context_messages(&settings).unwrap();
        assert_eq!(
            roles_and_contents(&messages),
            vec![
                (ChatRole::User, "first"),
                (ChatRole::Assistant, "one"),
                (ChatRole::User, "again"),
            ]
        );
    }

    #[test]
    fn test_system_message_goes_first() {
        let mut settings = Settings::default();
        settings.write_memory = true;
        settings.set_system_message("You are a pirate.");
        let mut session = Session::new();
        answer(&mut session, &settings, "ahoy", "arr");

        session.begin_turn("where is the gold");
        let messages = session.context_messages(&settings).unwrap();
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, "You are a pirate.");
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn test_abandoned_turn_keeps_its_number_and_is_skipped() {
        let mut settings = Settings::default();
        settings.write_memory = true;
        let mut session = Session::new();
        answer(&mut session, &settings, "first", "one");

        session.begin_turn("lost");
        session.abandon_turn();
        assert_eq!(session.output(), "one");
        assert!(session.pending_request().is_none());

        assert_eq!(session.begin_turn("third"), 3);
        let messages = session.context_messages(&settings).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(session.memory_turns(), 1);
    }

    #[test]
    fn test_complete_turn_returns_stored_turn() {
        let settings = Settings::default();
        let mut session = Session::new();
        assert!(session
            .complete_turn("orphan", TurnMetadata::capture(&settings))
            .is_err());

        session.begin_turn("question");
        let returned = session
            .complete_turn("answer", TurnMetadata::capture(&settings))
            .unwrap()
            .clone();
        assert_eq!(returned.human, "question");
        assert_eq!(returned.ai, "answer");
        assert_eq!(session.turn(1), Some(&returned));
        assert_eq!(session.output(), "answer");
    }

    #[test]
    fn test_context_requires_submitted_turn() {
        let session = Session::new();
        assert!(session.context_messages(&Settings::default()).is_err());
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let settings = Settings::default();
        let mut session = Session::new();
        answer(&mut session, &settings, "a", "b");
        session.reset();
        assert!(session.is_empty());
        assert_eq!(session.output(), "");
        assert_eq!(session.begin_turn("again"), 1);
    }

    #[test]
    fn test_export_json_shape() {
        let mut settings = Settings::default();
        settings.write_memory = true;
        let mut session = Session::new();
        answer(&mut session, &settings, "héllo", "wörld");
        session.begin_turn("pending");
        session.abandon_turn();

        let json = session.to_json().unwrap();
        assert!(json.contains("héllo"));

        let value: Value = serde_json::from_str(&json).unwrap();
        let turn = &value["turn_1"];
        assert_eq!(turn["human"], "héllo");
        assert_eq!(turn["ai"], "wörld");
        assert_eq!(turn["metadata"]["model_name"], "gpt-4o");
        assert_eq!(turn["metadata"]["chain"], "Top Probability");
        assert_eq!(turn["metadata"]["memory"], true);
        assert_eq!(turn["metadata"]["system"], "");
        assert_eq!(value["turn_2"], serde_json::json!({}));
    }

    #[test]
    fn test_timestamp_format() {
        let metadata = TurnMetadata::capture(&Settings::default());
        assert!(
            chrono::NaiveDateTime::parse_from_str(&metadata.timestamp, TIMESTAMP_FORMAT).is_ok()
        );
    }
}

use std::path::Path;

use crate::{
    chat::{ChatProvider, Usage},
    config::Connection,
    error::LLMError,
    session::{Session, Turn, TurnMetadata},
    settings::Settings,
};

/// A completed submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub number: u64,
    pub turn: Turn,
    pub usage: Option<Usage>,
}

/// Settings, session and connection of one playground.
#[derive(Debug, Clone, Default)]
pub struct Playground {
    pub settings: Settings,
    pub session: Session,
    pub connection: Connection,
}

impl Playground {
    pub fn new(settings: Settings, connection: Connection) -> Self {
        Self {
            settings,
            session: Session::new(),
            connection,
        }
    }

    /// Submits `prompt` to the selected model.
    ///
    /// `expected_response` is the reply used by the `develop-debugging` model
    /// and ignored otherwise. Configuration problems (missing API key, bad
    /// base URL) are reported before a turn number is consumed.
    pub async fn submit(
        &mut self,
        prompt: &str,
        expected_response: Option<String>,
    ) -> Result<Submission, LLMError> {
        let provider =
            self.settings
                .model
                .to_provider(&self.settings, &self.connection, expected_response)?;
        self.submit_with(provider.as_ref(), prompt).await
    }

    /// Submits `prompt` through an explicit provider.
    pub async fn submit_with(
        &mut self,
        provider: &dyn ChatProvider,
        prompt: &str,
    ) -> Result<Submission, LLMError> {
        self.settings.validate()?;
        let number = self.session.begin_turn(prompt);
        let messages = self.session.context_messages(&self.settings)?;
        log::info!(
            "turn {number}: sending {} messages to {}",
            messages.len(),
            self.settings.model
        );

        let response = match provider.chat(&messages).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("turn {number} failed: {e}");
                self.session.abandon_turn();
                return Err(e);
            }
        };
        let usage = response.usage();
        if let Some(usage) = &usage {
            log::debug!("turn {number}: {} tokens", usage.total_tokens);
        }

        let output = response.text().unwrap_or_default();
        let metadata = TurnMetadata::capture(&self.settings);
        let turn = self.session.complete_turn(output, metadata)?.clone();
        Ok(Submission {
            number,
            turn,
            usage,
        })
    }

    /// Clears the conversation, keeping settings and connection.
    pub fn reset(&mut self) {
        self.session.reset();
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), LLMError> {
        self.session.export(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ChatResponse, ChatRole};
    use crate::models::Models;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Reply(String);

    impl std::fmt::Display for Reply {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl ChatResponse for Reply {
        fn text(&self) -> Option<String> {
            Some(self.0.clone())
        }

        fn usage(&self) -> Option<Usage> {
            Some(Usage {
                prompt_tokens: 3,
                completion_tokens: 1,
                total_tokens: 4,
            })
        }
    }

    /// Answers "reply <n>" and records every conversation it receives.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatProvider for Recorder {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            if self.fail {
                return Err(LLMError::HttpError("connection refused".into()));
            }
            Ok(Box::new(Reply(format!("reply {}", calls.len()))))
        }
    }

    #[tokio::test]
    async fn test_memory_conversation() {
        let mut playground = Playground::default();
        playground.settings.write_memory = true;
        let provider = Recorder::default();

        let first = playground.submit_with(&provider, "hello").await.unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(first.turn.ai, "reply 1");
        assert_eq!(first.usage.unwrap().total_tokens, 4);

        playground.submit_with(&provider, "again").await.unwrap();

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 1);
        let second: Vec<_> = calls[1].iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            second,
            vec![
                (ChatRole::User, "hello"),
                (ChatRole::Assistant, "reply 1"),
                (ChatRole::User, "again"),
            ]
        );
        assert_eq!(playground.session.output(), "reply 2");
    }

    #[tokio::test]
    async fn test_failed_call_consumes_turn_but_keeps_output() {
        let mut playground = Playground::default();
        playground
            .submit_with(&Recorder::default(), "ok")
            .await
            .unwrap();

        let failing = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let err = playground.submit_with(&failing, "boom").await;
        assert!(matches!(err, Err(LLMError::HttpError(_))));
        assert_eq!(playground.session.output(), "reply 1");
        assert_eq!(playground.session.current_turn(), 2);
        assert!(playground.session.turn(2).is_none());

        let next = playground
            .submit_with(&Recorder::default(), "retry")
            .await
            .unwrap();
        assert_eq!(next.number, 3);
    }

    #[tokio::test]
    async fn test_missing_api_key_does_not_consume_turn() {
        let mut playground = Playground::default();
        let err = playground.submit("hi", None).await;
        assert!(matches!(err, Err(LLMError::AuthError(_))));
        assert_eq!(playground.session.current_turn(), 0);
        assert!(playground.session.is_empty());
    }

    #[tokio::test]
    async fn test_debugging_model_records_expected_response() {
        let mut settings = Settings::default();
        settings.model = Models::DevelopDebugging;
        let mut playground = Playground::new(settings, Connection::default());

        let submission = playground
            .submit("what is 2+2?", Some("4".into()))
            .await
            .unwrap();
        assert_eq!(submission.turn.ai, "4");
        assert_eq!(submission.turn.metadata.model_name, "develop-debugging");

        let empty = playground.submit("and now?", None).await.unwrap();
        assert_eq!(empty.turn.ai, "");
    }

    #[tokio::test]
    async fn test_reset_keeps_settings() {
        let mut playground = Playground::default();
        playground.settings.write_memory = true;
        playground
            .submit_with(&Recorder::default(), "hello")
            .await
            .unwrap();
        playground.reset();
        assert!(playground.session.is_empty());
        assert!(playground.settings.write_memory);
        assert_eq!(playground.session.next_turn_label(), 1);
    }
}

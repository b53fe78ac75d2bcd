//! Turn-based debate between two chat endpoints.
//!
//! Each round is one reply from the initiator followed by one from the
//! responder. Every call carries the full interleaved history so far:
//! a speaker sees its own prior statements tagged as assistant and the
//! opponent's tagged as user.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatBackend, sanitize_response};
use crate::context::ChatMessage;
use crate::error::{Error, Result};

pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 20;

/// One side of the debate: a named endpoint with its system prompt.
///
/// Immutable for the duration of a session; reconfiguring a side means
/// building a new `Debater`.
pub struct Debater {
    pub name: String,
    pub system_prompt: String,
    backend: Box<dyn ChatBackend>,
}

impl Debater {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        backend: Box<dyn ChatBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            backend,
        }
    }
}

/// What to do when an endpoint call fails mid-debate.
///
/// `Continue` reproduces the never-stop-the-show behaviour: the error is
/// rendered as the turn's text and fed to the opponent like any other
/// statement. `Abort` ends the debate with the error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

#[derive(Debug, Clone)]
pub struct DebateConfig {
    /// Rounds after the opening statements (1-20).
    pub rounds: u32,
    pub on_failure: FailurePolicy,
}

impl DebateConfig {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds,
            on_failure: FailurePolicy::default(),
        }
    }
}

/// A statement in the debate transcript, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub content: String,
}

/// Events emitted while the debate runs.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    RoundStart { round: u32 },
    Statement { speaker: String, content: String },
    Finished,
}

pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Drives the alternating turn loop between two debaters.
pub struct DebateOrchestrator {
    config: DebateConfig,
    initiator: Debater,
    responder: Debater,
    /// Statements per side, opening first. The two lists stay in
    /// lockstep; the responder trails by one inside a round.
    initiator_statements: Vec<String>,
    responder_statements: Vec<String>,
    transcript: Vec<TranscriptEntry>,
    callback: Option<DebateCallback>,
}

impl DebateOrchestrator {
    pub fn new(
        initiator: Debater,
        responder: Debater,
        initiator_opening: impl Into<String>,
        responder_opening: impl Into<String>,
        config: DebateConfig,
    ) -> Result<Self> {
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&config.rounds) {
            return Err(Error::InvalidRounds {
                min: MIN_ROUNDS,
                max: MAX_ROUNDS,
                actual: config.rounds,
            });
        }

        Ok(Self {
            config,
            initiator,
            responder,
            initiator_statements: vec![initiator_opening.into()],
            responder_statements: vec![responder_opening.into()],
            transcript: Vec::new(),
            callback: None,
        })
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Run the full debate and return the transcript.
    pub async fn run(&mut self) -> Result<Vec<TranscriptEntry>> {
        let name = self.initiator.name.clone();
        let opening = self.initiator_statements[0].clone();
        self.record(&name, &opening);

        let name = self.responder.name.clone();
        let opening = self.responder_statements[0].clone();
        self.record(&name, &opening);

        for round in 1..=self.config.rounds {
            self.emit(DebateEvent::RoundStart { round });

            let history = self.initiator_history();
            let reply = self.exchange(&self.initiator, history).await?;
            self.initiator_statements.push(reply.clone());
            let name = self.initiator.name.clone();
            self.record(&name, &reply);

            let history = self.responder_history();
            let reply = self.exchange(&self.responder, history).await?;
            self.responder_statements.push(reply.clone());
            let name = self.responder.name.clone();
            self.record(&name, &reply);

            tracing::debug!(round, "round complete");
        }

        self.emit(DebateEvent::Finished);
        Ok(self.transcript.clone())
    }

    /// Get the transcript accumulated so far.
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// History as the initiator sees it: its own statements are
    /// assistant turns, the responder's are user turns.
    fn initiator_history(&self) -> Vec<ChatMessage> {
        let mut history = vec![ChatMessage::system(self.initiator.system_prompt.clone())];
        for (own, other) in self
            .initiator_statements
            .iter()
            .zip(&self.responder_statements)
        {
            history.push(ChatMessage::assistant(own.clone()));
            history.push(ChatMessage::user(other.clone()));
        }
        history
    }

    /// History as the responder sees it, including the initiator's
    /// newest statement, which has no reply yet.
    fn responder_history(&self) -> Vec<ChatMessage> {
        let mut history = vec![ChatMessage::system(self.responder.system_prompt.clone())];
        for (other, own) in self
            .initiator_statements
            .iter()
            .zip(&self.responder_statements)
        {
            history.push(ChatMessage::user(other.clone()));
            history.push(ChatMessage::assistant(own.clone()));
        }
        if self.initiator_statements.len() > self.responder_statements.len() {
            if let Some(latest) = self.initiator_statements.last() {
                history.push(ChatMessage::user(latest.clone()));
            }
        }
        history
    }

    async fn exchange(&self, debater: &Debater, history: Vec<ChatMessage>) -> Result<String> {
        match debater.backend.complete(&history).await {
            Ok(reply) => Ok(sanitize_response(&reply)),
            Err(err) => match self.config.on_failure {
                FailurePolicy::Abort => Err(err),
                FailurePolicy::Continue => {
                    tracing::warn!(speaker = %debater.name, error = %err, "endpoint call failed, continuing");
                    Ok(format!("[{} error: {}]", debater.name, err))
                }
            },
        }
    }

    fn record(&mut self, speaker: &str, content: &str) {
        self.emit(DebateEvent::Statement {
            speaker: speaker.to_string(),
            content: content.to_string(),
        });
        self.transcript.push(TranscriptEntry {
            speaker: speaker.to_string(),
            content: content.to_string(),
        });
    }

    fn emit(&self, event: DebateEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every history it is called with and replies with a fixed string.
    struct StubBackend {
        reply: String,
        calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    impl StubBackend {
        fn new(reply: &str) -> (Self, Arc<Mutex<Vec<Vec<ChatMessage>>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    reply: reply.to_string(),
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ChatBackend for StubBackend {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ChatBackend for FailingBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(Error::Chat("connection refused".to_string()))
        }
    }

    fn stub_debater(name: &str, reply: &str) -> (Debater, Arc<Mutex<Vec<Vec<ChatMessage>>>>) {
        let (backend, calls) = StubBackend::new(reply);
        (
            Debater::new(name, format!("You are {name}."), Box::new(backend)),
            calls,
        )
    }

    #[tokio::test]
    async fn transcript_has_two_plus_two_n_entries() {
        let (alpha, _) = stub_debater("Alpha", "Alpha says so.");
        let (beta, _) = stub_debater("Beta", "Beta disagrees.");
        let mut orchestrator = DebateOrchestrator::new(
            alpha,
            beta,
            "Opening A",
            "Opening B",
            DebateConfig::new(3),
        )
        .unwrap();

        let transcript = orchestrator.run().await.unwrap();
        assert_eq!(transcript.len(), 2 + 2 * 3);

        // Openings, then alternating pairs per round.
        let speakers: Vec<&str> = transcript.iter().map(|e| e.speaker.as_str()).collect();
        assert_eq!(
            speakers,
            vec!["Alpha", "Beta", "Alpha", "Beta", "Alpha", "Beta", "Alpha", "Beta"]
        );
    }

    #[tokio::test]
    async fn single_round_transcript_is_verbatim() {
        let (alpha, _) = stub_debater("Alpha", "Reply from Alpha.");
        let (beta, _) = stub_debater("Beta", "Reply from Beta.");
        let mut orchestrator = DebateOrchestrator::new(
            alpha,
            beta,
            "Opening A",
            "Opening B",
            DebateConfig::new(1),
        )
        .unwrap();

        let transcript = orchestrator.run().await.unwrap();
        let expected = vec![
            TranscriptEntry {
                speaker: "Alpha".to_string(),
                content: "Opening A".to_string(),
            },
            TranscriptEntry {
                speaker: "Beta".to_string(),
                content: "Opening B".to_string(),
            },
            TranscriptEntry {
                speaker: "Alpha".to_string(),
                content: "Reply from Alpha.".to_string(),
            },
            TranscriptEntry {
                speaker: "Beta".to_string(),
                content: "Reply from Beta.".to_string(),
            },
        ];
        assert_eq!(transcript, expected);
    }

    #[tokio::test]
    async fn initiator_history_tags_roles_correctly() {
        let (alpha, alpha_calls) = stub_debater("Alpha", "Reply from Alpha.");
        let (beta, beta_calls) = stub_debater("Beta", "Reply from Beta.");
        let mut orchestrator = DebateOrchestrator::new(
            alpha,
            beta,
            "Opening A",
            "Opening B",
            DebateConfig::new(2),
        )
        .unwrap();
        orchestrator.run().await.unwrap();

        let alpha_calls = alpha_calls.lock().unwrap();
        // Round 1: system head, own opening as assistant, opponent's as user.
        let first = &alpha_calls[0];
        assert_eq!(first[0].role, Role::System);
        assert_eq!(first[1], ChatMessage::assistant("Opening A"));
        assert_eq!(first[2], ChatMessage::user("Opening B"));

        // Round 2 extends the interleaving with round 1's replies.
        let second = &alpha_calls[1];
        assert_eq!(second.len(), 5);
        assert_eq!(second[3], ChatMessage::assistant("Reply from Alpha."));
        assert_eq!(second[4], ChatMessage::user("Reply from Beta."));

        // Every call alternates assistant/user after the system head.
        for call in alpha_calls.iter() {
            for (i, message) in call.iter().enumerate().skip(1) {
                let expected = if i % 2 == 1 {
                    Role::Assistant
                } else {
                    Role::User
                };
                assert_eq!(message.role, expected);
            }
        }

        // The responder sees the mirror image plus the fresh statement.
        let beta_calls = beta_calls.lock().unwrap();
        let first = &beta_calls[0];
        assert_eq!(first.len(), 4);
        assert_eq!(first[0].role, Role::System);
        assert_eq!(first[1], ChatMessage::user("Opening A"));
        assert_eq!(first[2], ChatMessage::assistant("Opening B"));
        assert_eq!(first[3], ChatMessage::user("Reply from Alpha."));
    }

    #[tokio::test]
    async fn continue_policy_records_error_as_statement() {
        let (alpha, _) = stub_debater("Alpha", "Reply from Alpha.");
        let beta = Debater::new("Beta", "You are Beta.", Box::new(FailingBackend));
        let mut config = DebateConfig::new(1);
        config.on_failure = FailurePolicy::Continue;

        let mut orchestrator =
            DebateOrchestrator::new(alpha, beta, "Opening A", "Opening B", config).unwrap();
        let transcript = orchestrator.run().await.unwrap();

        assert_eq!(transcript.len(), 4);
        assert!(transcript[3].content.starts_with("[Beta error:"));
    }

    #[tokio::test]
    async fn abort_policy_stops_on_failure() {
        let (alpha, _) = stub_debater("Alpha", "Reply from Alpha.");
        let beta = Debater::new("Beta", "You are Beta.", Box::new(FailingBackend));

        let mut orchestrator = DebateOrchestrator::new(
            alpha,
            beta,
            "Opening A",
            "Opening B",
            DebateConfig::new(1),
        )
        .unwrap();
        assert!(orchestrator.run().await.is_err());
        // The initiator's turn landed before the failure.
        assert_eq!(orchestrator.transcript().len(), 3);
    }

    #[test]
    fn rejects_out_of_range_rounds() {
        for rounds in [0, 21] {
            let (alpha, _) = stub_debater("Alpha", "x");
            let (beta, _) = stub_debater("Beta", "y");
            let result =
                DebateOrchestrator::new(alpha, beta, "a", "b", DebateConfig::new(rounds));
            assert!(matches!(result, Err(Error::InvalidRounds { .. })));
        }
    }
}

//! Voice client loop
//!
//! Listens for speech, sends it to the turn server, speaks the reply, then
//! keeps listening for follow-ups until the user falls silent or says an
//! exit phrase.

mod http;
mod speaker;

use async_trait::async_trait;

pub use http::ApiClient;
pub use speaker::{ConsoleSpeaker, RemoteSpeaker};

use crate::Result;
use crate::voice::{SpeechRecognizer, Speaker};

/// Phrases that end the conversation
pub const EXIT_PHRASES: [&str; 2] = ["exit", "quit"];

/// Spoken when the wake phrase arrives without a command
const WAKE_ACKNOWLEDGEMENT: &str = "Yes?";

/// Sends user input to the assistant and returns its reply
#[async_trait]
pub trait TurnClient: Send + Sync {
    /// Run one conversation turn
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or the turn fails
    async fn send_turn(&self, user_input: &str) -> Result<String>;
}

/// Client loop state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Waiting for a top-level utterance
    Listening,
    /// Sending input to the turn server
    Sending {
        input: String,
        /// Whether the input came from a follow-up listen
        follow_up: bool,
    },
    /// Speaking the assistant's reply
    Speaking { reply: String },
    /// Listening for a follow-up without the wake phrase
    FollowUp,
    /// Conversation over
    Exiting,
}

/// Check whether `text` is an exit phrase
#[must_use]
pub fn is_exit_phrase(text: &str) -> bool {
    let text = text.trim();
    EXIT_PHRASES.iter().any(|p| text.eq_ignore_ascii_case(p))
}

/// Wake phrase gate for top-level utterances
#[derive(Debug, Clone)]
pub struct WakePhrase {
    phrase: String,
}

impl WakePhrase {
    /// Create a wake phrase; matching is case-insensitive
    #[must_use]
    pub fn new(phrase: &str) -> Self {
        Self {
            phrase: phrase.trim().to_lowercase(),
        }
    }

    /// The normalized phrase
    #[must_use]
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Return the command following the wake phrase, or `None` if absent
    ///
    /// The phrase must stand as whole words. The command may be empty when
    /// the phrase was said on its own.
    #[must_use]
    pub fn extract_command(&self, transcript: &str) -> Option<String> {
        let lower = transcript.to_lowercase();
        let is_word = |c: char| c.is_alphanumeric() || c == '\'';

        let end = lower
            .match_indices(&self.phrase)
            .map(|(start, _)| (start, start + self.phrase.len()))
            .find(|&(start, end)| {
                !lower[..start].chars().next_back().is_some_and(is_word)
                    && !lower[end..].chars().next().is_some_and(is_word)
            })
            .map(|(_, end)| end)?;

        // Lowercasing can shift byte offsets; use the lowered text then
        let rest = transcript
            .get(end..)
            .filter(|_| lower.len() == transcript.len())
            .unwrap_or(&lower[end..]);

        Some(
            rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
                .trim_end()
                .to_string(),
        )
    }
}

/// Drives one user's spoken conversation with the turn server
pub struct ClientLoop<R, S, T> {
    recognizer: R,
    speaker: S,
    turns: T,
    wake_phrase: Option<WakePhrase>,
    state: ClientState,
}

impl<R, S, T> ClientLoop<R, S, T>
where
    R: SpeechRecognizer,
    S: Speaker,
    T: TurnClient,
{
    /// Create a client loop in the listening state
    pub const fn new(recognizer: R, speaker: S, turns: T) -> Self {
        Self {
            recognizer,
            speaker,
            turns,
            wake_phrase: None,
            state: ClientState::Listening,
        }
    }

    /// Require a wake phrase before top-level commands
    #[must_use]
    pub fn with_wake_phrase(mut self, phrase: Option<WakePhrase>) -> Self {
        self.wake_phrase = phrase;
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &ClientState {
        &self.state
    }

    /// Run until the user exits or input closes
    pub async fn run(&mut self) {
        while self.state != ClientState::Exiting {
            self.step().await;
        }
        tracing::info!("conversation ended");
    }

    /// Perform one state transition and return the new state
    pub async fn step(&mut self) -> &ClientState {
        let state = std::mem::replace(&mut self.state, ClientState::Exiting);
        self.state = match state {
            ClientState::Listening => self.on_listening().await,
            ClientState::Sending { input, follow_up } => self.on_sending(&input, follow_up).await,
            ClientState::Speaking { reply } => {
                self.speaker.synthesize_and_play(&reply).await;
                ClientState::FollowUp
            }
            ClientState::FollowUp => self.on_follow_up().await,
            ClientState::Exiting => ClientState::Exiting,
        };

        tracing::trace!(state = ?self.state, "client state");
        &self.state
    }

    async fn on_listening(&mut self) -> ClientState {
        let Some(text) = self.recognizer.listen().await else {
            return self.silence_or(ClientState::Listening);
        };

        if is_exit_phrase(&text) {
            return ClientState::Exiting;
        }

        let Some(wake) = &self.wake_phrase else {
            return ClientState::Sending {
                input: text,
                follow_up: false,
            };
        };

        match wake.extract_command(&text) {
            None => {
                tracing::debug!(transcript = %text, "no wake phrase, ignoring");
                ClientState::Listening
            }
            Some(command) if command.is_empty() => {
                self.speaker.synthesize_and_play(WAKE_ACKNOWLEDGEMENT).await;
                ClientState::FollowUp
            }
            Some(command) if is_exit_phrase(&command) => ClientState::Exiting,
            Some(command) => ClientState::Sending {
                input: command,
                follow_up: false,
            },
        }
    }

    async fn on_sending(&mut self, input: &str, follow_up: bool) -> ClientState {
        let fallback = if follow_up {
            ClientState::FollowUp
        } else {
            ClientState::Listening
        };

        match self.turns.send_turn(input).await {
            Ok(reply) if reply.trim().is_empty() => {
                tracing::warn!("assistant returned an empty reply");
                fallback
            }
            Ok(reply) => {
                tracing::info!(reply = %reply, "assistant replied");
                ClientState::Speaking { reply }
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                fallback
            }
        }
    }

    async fn on_follow_up(&mut self) -> ClientState {
        match self.recognizer.listen().await {
            Some(text) if is_exit_phrase(&text) => ClientState::Exiting,
            Some(text) => ClientState::Sending {
                input: text,
                follow_up: true,
            },
            None => self.silence_or(ClientState::Listening),
        }
    }

    fn silence_or(&self, next: ClientState) -> ClientState {
        if self.recognizer.is_closed() {
            ClientState::Exiting
        } else {
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_phrases() {
        assert!(is_exit_phrase("exit"));
        assert!(is_exit_phrase(" Quit "));
        assert!(is_exit_phrase("EXIT"));
        assert!(!is_exit_phrase("exit now"));
        assert!(!is_exit_phrase("please quit"));
    }

    #[test]
    fn test_wake_phrase_extracts_command() {
        let wake = WakePhrase::new("Hey Murmur");
        assert_eq!(wake.phrase(), "hey murmur");
        assert_eq!(
            wake.extract_command("Hey Murmur, book a table for two"),
            Some("book a table for two".to_string())
        );
        assert_eq!(wake.extract_command("hey murmur"), Some(String::new()));
        assert_eq!(wake.extract_command("book a table"), None);
    }

    #[test]
    fn test_wake_phrase_needs_word_boundaries() {
        let wake = WakePhrase::new("hey murmur");
        assert_eq!(wake.extract_command("they murmured about dinner"), None);
        assert_eq!(wake.extract_command("hey murmurs"), None);
        assert_eq!(
            wake.extract_command("they said hey murmur. what's on tonight?"),
            Some("what's on tonight?".to_string())
        );
        assert_eq!(
            wake.extract_command("hey murmuring, hey murmur stop"),
            Some("stop".to_string())
        );
    }
}

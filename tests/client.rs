//! Client loop integration tests
//!
//! Drives the state machine with scripted speech and a fake turn server

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use murmur::client::{ClientLoop, ClientState, TurnClient, WakePhrase};
use murmur::voice::{SpeechRecognizer, Speaker};
use murmur::{Error, Result};

/// Recognizer that replays scripted utterances, then reports closed
struct ScriptedRecognizer {
    utterances: VecDeque<Option<String>>,
}

impl ScriptedRecognizer {
    fn new(utterances: &[Option<&str>]) -> Self {
        Self {
            utterances: utterances.iter().map(|u| u.map(str::to_string)).collect(),
        }
    }
}

#[async_trait(?Send)]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn listen(&mut self) -> Option<String> {
        self.utterances.pop_front().flatten()
    }

    fn is_closed(&self) -> bool {
        self.utterances.is_empty()
    }
}

/// Speaker that records what it was asked to say
#[derive(Clone, Default)]
struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSpeaker {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait(?Send)]
impl Speaker for RecordingSpeaker {
    async fn synthesize_and_play(&mut self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

/// Turn server that answers from a script and records requests
#[derive(Clone, Default)]
struct FakeTurns {
    replies: Arc<Mutex<VecDeque<Result<String>>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl FakeTurns {
    fn with_replies(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            sent: Arc::default(),
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TurnClient for FakeTurns {
    async fn send_turn(&self, user_input: &str) -> Result<String> {
        self.sent.lock().unwrap().push(user_input.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("echo: {user_input}")))
    }
}

fn reply(text: &str) -> Result<String> {
    Ok(text.to_string())
}

#[tokio::test]
async fn test_full_exchange_with_follow_up() {
    let speaker = RecordingSpeaker::default();
    let turns = FakeTurns::with_replies(vec![reply("Hi Alice"), reply("It is sunny")]);
    let recognizer = ScriptedRecognizer::new(&[
        Some("Hello, I'm Alice"),
        Some("What's the weather?"),
        None,
        Some("quit"),
    ]);

    let mut client = ClientLoop::new(recognizer, speaker.clone(), turns.clone());

    assert_eq!(
        client.step().await,
        &ClientState::Sending {
            input: "Hello, I'm Alice".to_string(),
            follow_up: false,
        }
    );
    assert_eq!(
        client.step().await,
        &ClientState::Speaking {
            reply: "Hi Alice".to_string()
        }
    );
    assert_eq!(client.step().await, &ClientState::FollowUp);
    assert_eq!(
        client.step().await,
        &ClientState::Sending {
            input: "What's the weather?".to_string(),
            follow_up: true,
        }
    );

    client.run().await;

    assert_eq!(client.state(), &ClientState::Exiting);
    assert_eq!(turns.sent(), vec!["Hello, I'm Alice", "What's the weather?"]);
    assert_eq!(speaker.spoken(), vec!["Hi Alice", "It is sunny"]);
}

#[tokio::test]
async fn test_exit_phrase_at_top_level() {
    let turns = FakeTurns::default();
    let recognizer = ScriptedRecognizer::new(&[Some("  EXIT "), Some("never heard")]);

    let mut client = ClientLoop::new(recognizer, RecordingSpeaker::default(), turns.clone());

    assert_eq!(client.step().await, &ClientState::Exiting);
    assert!(turns.sent().is_empty());
}

#[tokio::test]
async fn test_exit_phrase_during_follow_up() {
    let turns = FakeTurns::default();
    let recognizer = ScriptedRecognizer::new(&[Some("hello"), Some("quit"), Some("unused")]);

    let mut client = ClientLoop::new(recognizer, RecordingSpeaker::default(), turns.clone());
    client.run().await;

    assert_eq!(turns.sent(), vec!["hello"]);
}

#[tokio::test]
async fn test_silence_keeps_listening() {
    let recognizer = ScriptedRecognizer::new(&[None, None, Some("exit")]);

    let mut client = ClientLoop::new(recognizer, RecordingSpeaker::default(), FakeTurns::default());

    assert_eq!(client.step().await, &ClientState::Listening);
    assert_eq!(client.step().await, &ClientState::Listening);
    assert_eq!(client.step().await, &ClientState::Exiting);
}

#[tokio::test]
async fn test_silent_follow_up_returns_to_listening() {
    let recognizer = ScriptedRecognizer::new(&[Some("hi"), None, Some("exit")]);

    let mut client = ClientLoop::new(recognizer, RecordingSpeaker::default(), FakeTurns::default());

    client.step().await; // Sending
    client.step().await; // Speaking
    assert_eq!(client.step().await, &ClientState::FollowUp);
    assert_eq!(client.step().await, &ClientState::Listening);
}

#[tokio::test]
async fn test_transport_failure_abandons_turn() {
    let speaker = RecordingSpeaker::default();
    let turns = FakeTurns::with_replies(vec![Err(Error::Transport("connection refused".into()))]);
    let recognizer = ScriptedRecognizer::new(&[Some("hello"), Some("exit")]);

    let mut client = ClientLoop::new(recognizer, speaker.clone(), turns.clone());

    client.step().await;
    assert_eq!(client.step().await, &ClientState::Listening);
    assert_eq!(client.step().await, &ClientState::Exiting);
    assert!(speaker.spoken().is_empty());
}

#[tokio::test]
async fn test_failed_follow_up_stays_in_follow_up() {
    let turns = FakeTurns::with_replies(vec![
        reply("first"),
        Err(Error::ModelUnavailable),
    ]);
    let recognizer = ScriptedRecognizer::new(&[Some("one"), Some("two"), Some("exit")]);

    let mut client = ClientLoop::new(recognizer, RecordingSpeaker::default(), turns);

    client.step().await; // Sending
    client.step().await; // Speaking
    client.step().await; // FollowUp
    client.step().await; // Sending (follow-up)
    assert_eq!(client.step().await, &ClientState::FollowUp);
}

#[tokio::test]
async fn test_empty_reply_is_not_spoken() {
    let speaker = RecordingSpeaker::default();
    let turns = FakeTurns::with_replies(vec![reply("   ")]);
    let recognizer = ScriptedRecognizer::new(&[Some("hello"), Some("exit")]);

    let mut client = ClientLoop::new(recognizer, speaker.clone(), turns);
    client.run().await;

    assert!(speaker.spoken().is_empty());
}

#[tokio::test]
async fn test_closed_input_exits() {
    let recognizer = ScriptedRecognizer::new(&[Some("hello")]);
    let turns = FakeTurns::default();

    let mut client = ClientLoop::new(recognizer, RecordingSpeaker::default(), turns.clone());
    client.run().await;

    assert_eq!(client.state(), &ClientState::Exiting);
    assert_eq!(turns.sent(), vec!["hello"]);
}

#[tokio::test]
async fn test_wake_phrase_gates_top_level_only() {
    let speaker = RecordingSpeaker::default();
    let turns = FakeTurns::default();
    let recognizer = ScriptedRecognizer::new(&[
        Some("what time is it"),
        Some("Hey Murmur, what time is it"),
        Some("and the date?"),
        None,
        Some("hey murmur"),
        Some("thanks"),
        Some("exit"),
    ]);

    let mut client = ClientLoop::new(recognizer, speaker.clone(), turns.clone())
        .with_wake_phrase(Some(WakePhrase::new("hey murmur")));

    assert_eq!(client.step().await, &ClientState::Listening);

    client.run().await;

    assert_eq!(
        turns.sent(),
        vec!["what time is it", "and the date?", "thanks"]
    );
    assert_eq!(
        speaker.spoken(),
        vec![
            "echo: what time is it",
            "echo: and the date?",
            "Yes?",
            "echo: thanks"
        ]
    );
}

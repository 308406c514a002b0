//! Voice processing module
//!
//! Audio capture, utterance detection, STT, TTS, and playback, plus the
//! recognizer and speaker interfaces the client loop is written against.

mod capture;
mod detector;
mod playback;
mod recognizer;
mod stt;
mod tts;

use async_trait::async_trait;

pub use capture::{InputDevice, Recording, SAMPLE_RATE};
pub use detector::{DetectorState, UtteranceDetector, calculate_energy};
pub use playback::AudioPlayback;
pub use recognizer::{MicrophoneRecognizer, StdinRecognizer};
pub use stt::{SpeechToText, SttProvider, samples_to_wav};
pub use tts::{SpeechSynthesizer, TextToSpeech, TtsProvider};

/// Turns user speech into text
///
/// Implementations block (asynchronously) until an utterance is recognized or
/// their internal timeout expires.
#[async_trait(?Send)]
pub trait SpeechRecognizer {
    /// Capture and transcribe one utterance
    ///
    /// Returns `None` on timeout, unintelligible audio, or recognition-service error.
    async fn listen(&mut self) -> Option<String>;

    /// Whether the input source is exhausted and will never yield speech again
    fn is_closed(&self) -> bool {
        false
    }
}

/// Speaks assistant replies
#[async_trait(?Send)]
pub trait Speaker {
    /// Convert `text` to audio and play it; failures are logged, not returned
    async fn synthesize_and_play(&mut self, text: &str);
}

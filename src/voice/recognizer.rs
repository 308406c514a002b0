//! Speech recognizers: microphone + STT, and a keyboard stand-in

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use super::{InputDevice, SpeechRecognizer, SpeechToText, UtteranceDetector};
use crate::Result;

/// How often the capture buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Recognizes speech from the default microphone via a cloud STT provider
pub struct MicrophoneRecognizer {
    input: InputDevice,
    detector: UtteranceDetector,
    stt: SpeechToText,
    listen_timeout: Duration,
}

impl MicrophoneRecognizer {
    /// Open the default input device
    ///
    /// `listen_timeout` bounds how long to wait for speech to start.
    ///
    /// # Errors
    ///
    /// Returns error if the microphone cannot be opened
    pub fn new(stt: SpeechToText, listen_timeout: Duration) -> Result<Self> {
        Ok(Self {
            input: InputDevice::open_default()?,
            detector: UtteranceDetector::new(),
            stt,
            listen_timeout,
        })
    }

    /// Record one utterance
    ///
    /// Returns `Ok(None)` when no speech started before the timeout.
    async fn capture_utterance(&mut self) -> Result<Option<Vec<f32>>> {
        self.detector.reset();
        let recording = self.input.record()?;
        let deadline = Instant::now() + self.listen_timeout;

        // The recording stops when dropped, before the reply is played
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let samples = recording.drain();
            if !samples.is_empty() && self.detector.process(&samples) {
                return Ok(Some(self.detector.take_utterance()));
            }

            if !self.detector.has_speech() && Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    async fn recognize(&mut self) -> Result<Option<String>> {
        let Some(samples) = self.capture_utterance().await? else {
            return Ok(None);
        };

        tracing::debug!(samples = samples.len(), "transcribing utterance");
        self.stt.transcribe(&samples).await.map(Some)
    }
}

#[async_trait(?Send)]
impl SpeechRecognizer for MicrophoneRecognizer {
    async fn listen(&mut self) -> Option<String> {
        tracing::info!("listening");

        match self.recognize().await {
            Ok(Some(text)) => {
                tracing::info!(transcript = %text, "speech recognized");
                Some(text)
            }
            Ok(None) => {
                tracing::info!("no speech detected");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "speech recognition failed");
                None
            }
        }
    }
}

/// Reads utterances from standard input, one per line
///
/// A blank line behaves like silence; end of input closes the recognizer.
pub struct StdinRecognizer {
    lines: Lines<BufReader<Stdin>>,
    closed: bool,
}

impl Default for StdinRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinRecognizer {
    /// Read from the process's standard input
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            closed: false,
        }
    }
}

#[async_trait(?Send)]
impl SpeechRecognizer for StdinRecognizer {
    async fn listen(&mut self) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        // Prompt write failures are ignored
        let _ = stdout.write_all(b"> ").await;
        let _ = stdout.flush().await;

        match self.lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                (!line.is_empty()).then(|| line.to_string())
            }
            Ok(None) => {
                self.closed = true;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read input");
                self.closed = true;
                None
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

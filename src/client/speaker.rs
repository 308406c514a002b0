//! Speaker implementations for the client loop

use async_trait::async_trait;

use super::ApiClient;
use crate::voice::{AudioPlayback, Speaker};

/// Fetches speech from the server and plays it locally
pub struct RemoteSpeaker {
    api: ApiClient,
    playback: AudioPlayback,
}

impl RemoteSpeaker {
    #[must_use]
    pub const fn new(api: ApiClient, playback: AudioPlayback) -> Self {
        Self { api, playback }
    }
}

#[async_trait(?Send)]
impl Speaker for RemoteSpeaker {
    async fn synthesize_and_play(&mut self, text: &str) {
        tracing::debug!(text, "speaking");

        let audio = match self.api.text_to_speech(text).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::error!(error = %e, "speech synthesis failed");
                return;
            }
        };

        // Playback blocks until the stream drains
        if let Err(e) = tokio::task::block_in_place(|| self.playback.play_mp3(&audio)) {
            tracing::error!(error = %e, "audio playback failed");
        }
    }
}

/// Prints replies to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSpeaker;

#[async_trait(?Send)]
impl Speaker for ConsoleSpeaker {
    async fn synthesize_and_play(&mut self, text: &str) {
        println!("AI: {text}");
    }
}

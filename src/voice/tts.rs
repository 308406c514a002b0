//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{ApiKeys, VoiceConfig};
use crate::{Error, Result};

/// Google Translate TTS rejects requests longer than this many characters
const GOOGLE_MAX_CHARS: usize = 100;

/// Produces MP3 audio for a piece of text
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    /// Google Translate TTS (no API key)
    Google,
    OpenAI,
    ElevenLabs,
}

impl TtsProvider {
    /// Parse from a config string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gtts" => Some(Self::Google),
            "openai" => Some(Self::OpenAI),
            "elevenlabs" => Some(Self::ElevenLabs),
            _ => None,
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a TTS instance from voice configuration and available keys
    ///
    /// Without an explicit provider, `OpenAI` is used when its key is present
    /// and Google Translate TTS otherwise.
    ///
    /// # Errors
    ///
    /// Returns error if the selected provider's API key is missing
    pub fn from_config(keys: &ApiKeys, voice: &VoiceConfig) -> Result<Self> {
        let provider = voice.tts_provider.unwrap_or(if keys.openai.is_some() {
            TtsProvider::OpenAI
        } else {
            TtsProvider::Google
        });

        match provider {
            TtsProvider::Google => Ok(Self::new_google(voice.tts_language.clone())),
            TtsProvider::OpenAI => Self::new_openai_with_model(
                secret_or_empty(keys.openai.as_ref()),
                voice.tts_voice.clone(),
                voice.tts_speed,
                voice.tts_model.clone().unwrap_or_else(|| "tts-1".to_string()),
            ),
            TtsProvider::ElevenLabs => Self::new_elevenlabs_with_model(
                secret_or_empty(keys.elevenlabs.as_ref()),
                voice.tts_voice.clone(),
                voice
                    .tts_model
                    .clone()
                    .unwrap_or_else(|| "eleven_monolingual_v1".to_string()),
            ),
        }
    }

    /// Create a new TTS instance using Google Translate TTS
    ///
    /// `language` is a language code such as "en" or "fr".
    #[must_use]
    pub fn new_google(language: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: None,
            voice: language,
            speed: 1.0,
            model: String::new(),
            provider: TtsProvider::Google,
        }
    }

    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai_with_model(
        api_key: String,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: Some(SecretString::from(api_key)),
            voice,
            speed,
            model,
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs_with_model(
        api_key: String,
        voice_id: String,
        model: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: Some(SecretString::from(api_key)),
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Active provider
    #[must_use]
    pub const fn provider(&self) -> TtsProvider {
        self.provider
    }

    fn api_key(&self) -> &str {
        self.api_key
            .as_ref()
            .map_or("", |k| k.expose_secret())
    }

    /// Synthesize using Google Translate TTS
    ///
    /// Long text is split into chunks the endpoint accepts; the MP3 responses
    /// are concatenated frame streams and play back as one file.
    async fn synthesize_google(&self, text: &str) -> Result<Vec<u8>> {
        let mut audio = Vec::new();
        let chunks = split_for_google(text, GOOGLE_MAX_CHARS);
        let total = chunks.len().to_string();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();

            let response = self
                .client
                .get("https://translate.google.com/translate_tts")
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", self.voice.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                    ("client", "tw-ob"),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
            }

            audio.extend_from_slice(&response.bytes().await?);
        }

        Ok(audio)
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key()))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(provider = ?self.provider, text_len = text.len(), "synthesizing speech");

        match self.provider {
            TtsProvider::Google => self.synthesize_google(text).await,
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }
}

fn secret_or_empty(key: Option<&SecretString>) -> String {
    key.map(|k| k.expose_secret().to_string()).unwrap_or_default()
}

/// Split text on whitespace into chunks of at most `max_chars` characters
///
/// Words longer than `max_chars` are split mid-word.
fn split_for_google(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            chunks.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!(TtsProvider::from_str("gtts"), Some(TtsProvider::Google));
        assert_eq!(TtsProvider::from_str("OpenAI"), Some(TtsProvider::OpenAI));
        assert_eq!(TtsProvider::from_str("polly"), None);
    }

    #[test]
    fn test_from_config_defaults_to_google() {
        let tts = TextToSpeech::from_config(&ApiKeys::default(), &VoiceConfig::default()).unwrap();
        assert_eq!(tts.provider(), TtsProvider::Google);
    }

    #[test]
    fn test_from_config_uses_openai_key() {
        let keys = ApiKeys {
            openai: Some(SecretString::from("sk-test".to_string())),
            ..ApiKeys::default()
        };
        let tts = TextToSpeech::from_config(&keys, &VoiceConfig::default()).unwrap();
        assert_eq!(tts.provider(), TtsProvider::OpenAI);
    }

    #[test]
    fn test_explicit_provider_needs_key() {
        let voice = VoiceConfig {
            tts_provider: Some(TtsProvider::ElevenLabs),
            ..VoiceConfig::default()
        };
        assert!(TextToSpeech::from_config(&ApiKeys::default(), &voice).is_err());
    }

    #[test]
    fn test_split_short_text() {
        assert_eq!(split_for_google("Hello there", 100), vec!["Hello there"]);
        assert!(split_for_google("   ", 100).is_empty());
    }

    #[test]
    fn test_split_respects_limit() {
        let text = "one two three four five six seven";
        let chunks = split_for_google(text, 10);
        assert_eq!(chunks, vec!["one two", "three four", "five six", "seven"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_split_long_word() {
        let chunks = split_for_google("ab abcdefghijk", 5);
        assert_eq!(chunks, vec!["ab", "abcde", "fghij", "k"]);
    }
}

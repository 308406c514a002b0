//! Speech-to-text via hosted transcription APIs
//!
//! Utterances arrive as 16 kHz mono samples from the microphone recognizer,
//! go out as a WAV upload, and come back as a trimmed transcript.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::SAMPLE_RATE;
use crate::config::{ApiKeys, VoiceConfig};
use crate::{Error, Result};

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_URL: &str = "https://api.deepgram.com/v1/listen";

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

impl SttProvider {
    const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }

    /// Extract the transcript from a provider's JSON response body
    fn parse_transcript(self, body: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Whisper {
            text: String,
        }

        #[derive(Deserialize)]
        struct Deepgram {
            results: DeepgramResults,
        }

        #[derive(Deserialize)]
        struct DeepgramResults {
            channels: Vec<DeepgramChannel>,
        }

        #[derive(Deserialize)]
        struct DeepgramChannel {
            alternatives: Vec<DeepgramAlternative>,
        }

        #[derive(Deserialize)]
        struct DeepgramAlternative {
            transcript: String,
        }

        let text = match self {
            Self::Whisper => serde_json::from_str::<Whisper>(body)?.text,
            Self::Deepgram => serde_json::from_str::<Deepgram>(body)?
                .results
                .channels
                .into_iter()
                .next()
                .and_then(|c| c.alternatives.into_iter().next())
                .map(|a| a.transcript)
                .unwrap_or_default(),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Recognition("could not understand audio".to_string()));
        }
        Ok(text.to_string())
    }
}

/// Transcribes recorded utterances
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Pick a provider from the configured keys
    ///
    /// `OpenAI` Whisper is preferred over Deepgram when both keys are present.
    ///
    /// # Errors
    ///
    /// Returns error if no STT provider key is configured
    pub fn from_config(keys: &ApiKeys, voice: &VoiceConfig) -> Result<Self> {
        let (provider, key) = match (&keys.openai, &keys.deepgram) {
            (Some(key), _) => (SttProvider::Whisper, key),
            (None, Some(key)) => (SttProvider::Deepgram, key),
            (None, None) => {
                return Err(Error::Config(
                    "speech recognition needs OPENAI_API_KEY or DEEPGRAM_API_KEY".to_string(),
                ));
            }
        };

        if key.expose_secret().trim().is_empty() {
            return Err(Error::Config(format!("{provider:?} API key is empty")));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: key.clone(),
            model: voice
                .stt_model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            provider,
        })
    }

    /// Active provider
    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe 16 kHz mono samples
    ///
    /// # Errors
    ///
    /// Returns `Recognition` if the provider heard nothing intelligible, or
    /// `Stt`/`Http` if the request fails
    pub async fn transcribe(&self, samples: &[f32]) -> Result<String> {
        let wav = samples_to_wav(samples, SAMPLE_RATE)?;
        tracing::debug!(provider = ?self.provider, wav_bytes = wav.len(), "transcribing");

        let response = self.request(wav)?.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(provider = ?self.provider, %status, body = %body, "STT API error");
            return Err(Error::Stt(format!("{:?} returned {status}: {body}", self.provider)));
        }

        let transcript = self.provider.parse_transcript(&body)?;
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    fn request(&self, wav: Vec<u8>) -> Result<reqwest::RequestBuilder> {
        let key = self.api_key.expose_secret();

        Ok(match self.provider {
            SttProvider::Whisper => {
                let file = reqwest::multipart::Part::bytes(wav)
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .part("file", file)
                    .text("model", self.model.clone());

                self.client.post(WHISPER_URL).bearer_auth(key).multipart(form)
            }
            SttProvider::Deepgram => self
                .client
                .post(DEEPGRAM_URL)
                .query(&[("model", self.model.as_str()), ("punctuate", "true")])
                .header(reqwest::header::AUTHORIZATION, format!("Token {key}"))
                .header(reqwest::header::CONTENT_TYPE, "audio/wav")
                .body(wav),
        })
    }
}

/// Encode mono samples as 16-bit PCM WAV
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let audio_err = |e: hound::Error| Error::Audio(e.to_string());

    let mut cursor = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(audio_err)?;
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        writer
            .write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .map_err(audio_err)?;
    }
    writer.finalize().map_err(audio_err)?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(openai: Option<&str>, deepgram: Option<&str>) -> ApiKeys {
        ApiKeys {
            openai: openai.map(|k| SecretString::from(k.to_string())),
            deepgram: deepgram.map(|k| SecretString::from(k.to_string())),
            ..ApiKeys::default()
        }
    }

    #[test]
    fn test_from_config_prefers_whisper() {
        let keys = keys(Some("sk"), Some("dg"));
        let stt = SpeechToText::from_config(&keys, &VoiceConfig::default()).unwrap();
        assert_eq!(stt.provider(), SttProvider::Whisper);
        assert_eq!(stt.model, "whisper-1");
    }

    #[test]
    fn test_from_config_falls_back_to_deepgram() {
        let stt =
            SpeechToText::from_config(&keys(None, Some("dg")), &VoiceConfig::default()).unwrap();
        assert_eq!(stt.provider(), SttProvider::Deepgram);
        assert_eq!(stt.model, "nova-2");
    }

    #[test]
    fn test_from_config_model_override() {
        let voice = VoiceConfig {
            stt_model: Some("whisper-large".to_string()),
            ..VoiceConfig::default()
        };
        let stt = SpeechToText::from_config(&keys(Some("sk"), None), &voice).unwrap();
        assert_eq!(stt.model, "whisper-large");
    }

    #[test]
    fn test_from_config_rejects_missing_or_blank_keys() {
        let voice = VoiceConfig::default();
        assert!(matches!(
            SpeechToText::from_config(&keys(None, None), &voice),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SpeechToText::from_config(&keys(Some("  "), None), &voice),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_whisper_transcript_is_trimmed() {
        let text = SttProvider::Whisper
            .parse_transcript(r#"{"text": "  What's the weather? "}"#)
            .unwrap();
        assert_eq!(text, "What's the weather?");
    }

    #[test]
    fn test_deepgram_first_alternative() {
        let body = r#"{"results": {"channels": [{"alternatives": [
            {"transcript": "book a table"}, {"transcript": "look a cable"}
        ]}]}}"#;
        assert_eq!(
            SttProvider::Deepgram.parse_transcript(body).unwrap(),
            "book a table"
        );
    }

    #[test]
    fn test_empty_transcript_is_recognition_error() {
        assert!(matches!(
            SttProvider::Whisper.parse_transcript(r#"{"text": "   "}"#),
            Err(Error::Recognition(_))
        ));
        assert!(matches!(
            SttProvider::Deepgram.parse_transcript(r#"{"results": {"channels": []}}"#),
            Err(Error::Recognition(_))
        ));
    }

    #[test]
    fn test_malformed_body_is_serialization_error() {
        assert!(matches!(
            SttProvider::Whisper.parse_transcript("<html>"),
            Err(Error::Serialization(_))
        ));
    }
}

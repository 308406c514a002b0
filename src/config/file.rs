//! TOML configuration file loading
//!
//! Supports `~/.config/murmur/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MurmurConfigFile {
    /// Turn server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Language model configuration
    #[serde(default)]
    pub model: ModelFileConfig,

    /// Conversation history tunables
    #[serde(default)]
    pub conversation: ConversationFileConfig,

    /// Interaction store configuration
    #[serde(default)]
    pub store: StoreFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Voice client configuration
    #[serde(default)]
    pub client: ClientFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Turn server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Language model configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    /// "llamacpp" or "openai"
    pub api: Option<String>,
    /// Inference server base URL
    pub url: Option<String>,
    /// Model name sent to OpenAI-compatible servers
    pub name: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Conversation history tunables
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    pub history_limit: Option<usize>,
    pub token_budget: Option<usize>,
    pub max_new_tokens: Option<u32>,
}

/// Interaction store configuration
#[derive(Debug, Default, Deserialize)]
pub struct StoreFileConfig {
    /// `SQLite` database path
    pub path: Option<String>,
    /// Set false to run without persistence
    pub enabled: Option<bool>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,
    /// TTS provider ("google", "openai", "elevenlabs")
    pub tts_provider: Option<String>,
    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,
    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,
    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
    /// TTS language code for Google TTS
    pub tts_language: Option<String>,
    /// Seconds to wait for speech to start
    pub listen_timeout_secs: Option<u64>,
}

/// Voice client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    pub server_url: Option<String>,
    pub user_id: Option<String>,
    pub wake_word: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MurmurConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MurmurConfigFile {
    config_file_path().map_or_else(MurmurConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_from(path: &Path) -> MurmurConfigFile {
    if !path.exists() {
        return MurmurConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MurmurConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MurmurConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/murmur/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    std::env::var("MURMUR_CONFIG").map_or_else(
        |_| directories::BaseDirs::new().map(|d| d.config_dir().join("murmur").join("config.toml")),
        |p| Some(PathBuf::from(p)),
    )
}

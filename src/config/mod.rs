//! Configuration management for murmur
//!
//! Values resolve as environment variable, then TOML file, then default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::conversation::TurnConfig;
use crate::llm::CompletionApi;
use crate::voice::TtsProvider;

/// Default turn server port
pub const DEFAULT_PORT: u16 = 8000;

/// Default user identifier for the voice client
pub const DEFAULT_USER_ID: &str = "user_123";

/// murmur configuration
#[derive(Debug)]
pub struct Config {
    /// Turn server configuration
    pub server: ServerConfig,

    /// Language model configuration
    pub model: ModelConfig,

    /// Conversation turn tunables
    pub turn: TurnConfig,

    /// Interaction store configuration
    pub store: StoreConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Voice client configuration
    pub client: ClientConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Turn server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Inference server protocol
    pub api: CompletionApi,

    /// Inference server base URL
    pub url: String,

    /// Model name (sent to OpenAI-compatible servers)
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api: CompletionApi::default(),
            url: "http://127.0.0.1:8080".to_string(),
            model: "llama-2-7b-chat".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Interaction store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to persist interactions at all
    pub enabled: bool,

    /// `SQLite` database path
    pub path: PathBuf,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model; provider default when unset
    pub stt_model: Option<String>,

    /// TTS provider; chosen from available keys when unset
    pub tts_provider: Option<TtsProvider>,

    /// TTS model for `OpenAI`/`ElevenLabs`
    pub tts_model: Option<String>,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Language code for Google TTS
    pub tts_language: String,

    /// Seconds to wait for speech to start before giving up
    pub listen_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: None,
            tts_provider: None,
            tts_model: None,
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            tts_language: "en".to_string(),
            listen_timeout_secs: 10,
        }
    }
}

/// Voice client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Turn server base URL
    pub server_url: String,

    /// User identifier sent with every turn
    pub user_id: String,

    /// Optional wake phrase required before top-level commands
    pub wake_word: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: format!("http://127.0.0.1:{DEFAULT_PORT}"),
            user_id: DEFAULT_USER_ID.to_string(),
            wake_word: None,
        }
    }
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,
}

impl Config {
    /// Load configuration from the process environment and config file
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed config file and an environment lookup
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn from_sources(fc: file::MurmurConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        // Turn server (env > toml > default)
        let server = ServerConfig {
            host: env("MURMUR_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&env, "MURMUR_PORT")
                .or_else(|| parse_var(&env, "PORT"))
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        // Language model (env > toml > default)
        let model_defaults = ModelConfig::default();
        let api = env("MURMUR_MODEL_API")
            .or(fc.model.api)
            .map_or(model_defaults.api, |s| {
                CompletionApi::from_str(&s).unwrap_or_else(|| {
                    tracing::warn!(api = %s, "unknown model API, using llama.cpp");
                    CompletionApi::LlamaCpp
                })
            });
        let model = ModelConfig {
            api,
            url: env("MURMUR_MODEL_URL")
                .or(fc.model.url)
                .unwrap_or(model_defaults.url),
            model: env("MURMUR_MODEL")
                .or(fc.model.name)
                .unwrap_or(model_defaults.model),
            timeout_secs: parse_var(&env, "MURMUR_MODEL_TIMEOUT")
                .or(fc.model.timeout_secs)
                .unwrap_or(model_defaults.timeout_secs),
        };

        // Conversation tunables
        let turn_defaults = TurnConfig::default();
        let turn = TurnConfig {
            history_limit: parse_var(&env, "MURMUR_HISTORY_LIMIT")
                .or(fc.conversation.history_limit)
                .unwrap_or(turn_defaults.history_limit),
            token_budget: parse_var(&env, "MURMUR_TOKEN_BUDGET")
                .or(fc.conversation.token_budget)
                .unwrap_or(turn_defaults.token_budget),
            max_new_tokens: parse_var(&env, "MURMUR_MAX_NEW_TOKENS")
                .or(fc.conversation.max_new_tokens)
                .unwrap_or(turn_defaults.max_new_tokens),
        };

        // Interaction store
        let store = StoreConfig {
            enabled: env("MURMUR_STORE_ENABLED")
                .map(|v| !matches!(v.as_str(), "false" | "0" | "no"))
                .or(fc.store.enabled)
                .unwrap_or(true),
            path: env("MURMUR_DATABASE")
                .or(fc.store.path)
                .map_or_else(default_database_path, PathBuf::from),
        };

        // Voice (env > toml > default)
        let voice_defaults = VoiceConfig::default();
        let tts_provider = env("MURMUR_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .and_then(|s| {
                let provider = TtsProvider::from_str(&s);
                if provider.is_none() {
                    tracing::warn!(provider = %s, "unknown TTS provider, choosing automatically");
                }
                provider
            });
        let voice = VoiceConfig {
            stt_model: env("MURMUR_STT_MODEL").or(fc.voice.stt_model),
            tts_provider,
            tts_model: env("MURMUR_TTS_MODEL").or(fc.voice.tts_model),
            tts_voice: env("MURMUR_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(voice_defaults.tts_voice),
            tts_speed: parse_var(&env, "MURMUR_TTS_SPEED")
                .or(fc.voice.tts_speed)
                .unwrap_or(voice_defaults.tts_speed),
            tts_language: env("MURMUR_TTS_LANGUAGE")
                .or(fc.voice.tts_language)
                .unwrap_or(voice_defaults.tts_language),
            listen_timeout_secs: parse_var(&env, "MURMUR_LISTEN_TIMEOUT")
                .or(fc.voice.listen_timeout_secs)
                .unwrap_or(voice_defaults.listen_timeout_secs),
        };

        // Voice client
        let client_defaults = ClientConfig::default();
        let client = ClientConfig {
            server_url: env("MURMUR_SERVER_URL")
                .or(fc.client.server_url)
                .unwrap_or(client_defaults.server_url),
            user_id: env("MURMUR_USER_ID")
                .or(fc.client.user_id)
                .unwrap_or(client_defaults.user_id),
            wake_word: env("MURMUR_WAKE_WORD")
                .or(fc.client.wake_word)
                .filter(|w| !w.trim().is_empty()),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
            deepgram: env("DEEPGRAM_API_KEY")
                .or(fc.api_keys.deepgram)
                .map(SecretString::from),
        };

        Self {
            server,
            model,
            turn,
            store,
            voice,
            client,
            api_keys,
        }
    }
}

/// Look up `key` and parse it, treating unparseable values as unset
fn parse_var<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    env(key).and_then(|s| s.trim().parse().ok())
}

/// Default database path: `~/.local/share/murmur/interactions.db` on Linux
fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("interactions.db"),
        |d| d.data_dir().join("murmur").join("interactions.db"),
    )
}

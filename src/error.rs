//! Error types for murmur

use thiserror::Error;

/// Result type alias for murmur operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in murmur
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No language model was loaded at startup
    #[error("language model not loaded")]
    ModelUnavailable,

    /// The language model produced only whitespace
    #[error("language model returned an empty response")]
    EmptyResponse,

    /// Inference request failed
    #[error("model error: {0}")]
    Model(String),

    /// Interaction store cannot be reached
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Could not reach the turn server
    #[error("transport error: {0}")]
    Transport(String),

    /// Speech input was not understood
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this error comes from the interaction store
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::Database(_) | Self::Sqlite(_)
        )
    }
}

//! Murmur - voice-driven conversational assistant
//!
//! This library provides the pieces of a spoken assistant:
//! - History-aware prompting (trimming stored exchanges to a token budget)
//! - A turn handler that runs the language model and persists each exchange
//! - An HTTP turn server (turns, text-to-speech, stored history)
//! - A voice client loop (listen, ask, speak, follow up)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Voice Client                       │
//! │   Microphone  │  STT  │  Client Loop  │  Playback   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Turn Server                         │
//! │   /turn  │  /text-to-speech  │  /interactions       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Turn Handler: history → trim → prompt → model     │
//! │   Interaction Store (SQLite)  │  Language Model     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod llm;
pub mod voice;

pub use config::Config;
pub use conversation::{TurnConfig, TurnHandler, assemble_prompt, trim_history};
pub use db::{DbConn, DbPool, Interaction, InteractionRepo, InteractionStore};
pub use error::{Error, Result};
pub use llm::{CompletionModel, LanguageModel};

//! Conversation core: history trimming, prompt assembly, and turn handling

mod history;
mod prompt;
mod turn;

pub use history::{DEFAULT_TOKEN_BUDGET, count_tokens, format_interaction, trim_history};
pub use prompt::{ASSISTANT_MARKER, assemble_prompt};
pub use turn::{DEFAULT_HISTORY_LIMIT, TurnConfig, TurnHandler};

//! Language model access
//!
//! Generation is synchronous and can take seconds; async callers run it on a
//! blocking worker (see [`crate::conversation::TurnHandler`]).

mod completion;

pub use completion::{CompletionApi, CompletionModel};

use crate::Result;

/// Default number of new tokens requested per reply
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 50;

/// A text-completion language model
pub trait LanguageModel: Send + Sync {
    /// Continue `prompt`, producing at most `max_new_tokens` tokens
    ///
    /// # Errors
    ///
    /// Returns error if inference fails
    fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String>;
}

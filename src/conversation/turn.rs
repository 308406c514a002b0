//! Conversation turn handling
//!
//! One turn: fetch recent history, trim it to the token budget, assemble the
//! prompt, run the model on a blocking worker, persist the exchange.

use std::sync::Arc;

use super::{DEFAULT_TOKEN_BUDGET, assemble_prompt, format_interaction, trim_history};
use crate::db::{Interaction, InteractionStore};
use crate::llm::{DEFAULT_MAX_NEW_TOKENS, LanguageModel};
use crate::{Error, Result};

/// Default number of past interactions fetched per turn
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Tunables for a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnConfig {
    /// Maximum interactions fetched from the store
    pub history_limit: usize,
    /// Token budget for the history part of the prompt
    pub token_budget: usize,
    /// New tokens requested from the model
    pub max_new_tokens: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            token_budget: DEFAULT_TOKEN_BUDGET,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }
}

/// Orchestrates conversation turns against a model and an interaction store
///
/// Either dependency may be absent. Without a model every turn fails with
/// [`Error::ModelUnavailable`]; without a store turns run history-less and
/// nothing is persisted.
#[derive(Clone)]
pub struct TurnHandler {
    model: Option<Arc<dyn LanguageModel>>,
    store: Option<Arc<dyn InteractionStore>>,
    config: TurnConfig,
}

impl TurnHandler {
    /// Create a turn handler
    #[must_use]
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        store: Option<Arc<dyn InteractionStore>>,
        config: TurnConfig,
    ) -> Self {
        Self {
            model,
            store,
            config,
        }
    }

    /// Whether a language model is loaded
    #[must_use]
    pub const fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// The interaction store, if one is configured
    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn InteractionStore>> {
        self.store.as_ref()
    }

    /// Build the prompt for `user_input` from the user's stored history
    #[must_use]
    pub fn build_prompt(&self, user_id: &str, user_input: &str) -> String {
        let history: Vec<String> = self
            .recent_history(user_id)
            .iter()
            .map(format_interaction)
            .collect();
        let trimmed = trim_history(&history, self.config.token_budget);

        tracing::debug!(
            user_id,
            fetched = history.len(),
            kept = trimmed.len(),
            "history trimmed"
        );

        assemble_prompt(&trimmed, user_input)
    }

    /// Handle one conversation turn and return the assistant's reply
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] if no model is loaded,
    /// [`Error::EmptyResponse`] if the model output is blank, or
    /// [`Error::Model`] if inference fails. Storage failures never fail a turn.
    pub async fn handle_turn(&self, user_id: &str, user_input: &str) -> Result<String> {
        tracing::info!(user_id, user_input, "turn received");

        let model = self.model.clone().ok_or(Error::ModelUnavailable)?;
        let prompt = self.build_prompt(user_id, user_input);
        let max_new_tokens = self.config.max_new_tokens;

        let raw = tokio::task::spawn_blocking(move || model.generate(&prompt, max_new_tokens))
            .await
            .map_err(|e| Error::Model(format!("inference task failed: {e}")))??;

        let reply = raw.trim();
        if reply.is_empty() {
            tracing::warn!(user_id, "model returned an empty response");
            return Err(Error::EmptyResponse);
        }

        self.persist(&Interaction::now(user_id, user_input, reply));

        tracing::info!(user_id, reply_len = reply.len(), "turn complete");
        Ok(reply.to_string())
    }

    /// Recent interactions, newest first; empty when the store is missing or failing
    fn recent_history(&self, user_id: &str) -> Vec<Interaction> {
        let Some(store) = &self.store else {
            return Vec::new();
        };

        best_effort(
            "fetch history",
            store.find_recent(user_id, self.config.history_limit),
        )
        .unwrap_or_default()
    }

    /// Store the interaction, ignoring storage failures
    fn persist(&self, interaction: &Interaction) {
        if let Some(store) = &self.store {
            best_effort("store interaction", store.insert(interaction));
        }
    }
}

/// Degraded-operation policy for the interaction store
///
/// Errors are logged and swallowed so the turn continues without history or
/// persistence. Anything other than a storage error is logged at error level.
fn best_effort<T>(operation: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_storage() => {
            tracing::warn!(operation, error = %e, "storage unavailable, continuing without it");
            None
        }
        Err(e) => {
            tracing::error!(operation, error = %e, "store operation failed");
            None
        }
    }
}

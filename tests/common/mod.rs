//! Shared test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use murmur::{
    DbPool, Error, Interaction, InteractionRepo, InteractionStore, LanguageModel, Result, db,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Repository over a fresh in-memory database
#[must_use]
pub fn setup_test_store() -> Arc<InteractionRepo> {
    Arc::new(InteractionRepo::new(setup_test_db()))
}

/// Insert an interaction with an explicit timestamp
pub fn insert_interaction(
    store: &dyn InteractionStore,
    user_id: &str,
    input: &str,
    reply: &str,
    ts: &str,
) {
    store
        .insert(&Interaction::new(user_id, input, reply, ts))
        .expect("failed to insert interaction");
}

/// Model that returns a fixed reply and records every prompt it sees
#[derive(Default)]
pub struct ScriptedModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn generate(&self, prompt: &str, _max_new_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Model whose inference always fails
pub struct BrokenModel;

impl LanguageModel for BrokenModel {
    fn generate(&self, _prompt: &str, _max_new_tokens: u32) -> Result<String> {
        Err(Error::Model("inference server returned 502".to_string()))
    }
}

/// Store where every operation fails
pub struct FailingStore;

impl InteractionStore for FailingStore {
    fn find_recent(&self, _user_id: &str, _limit: usize) -> Result<Vec<Interaction>> {
        Err(Error::StorageUnavailable("disk detached".to_string()))
    }

    fn insert(&self, _interaction: &Interaction) -> Result<()> {
        Err(Error::StorageUnavailable("disk detached".to_string()))
    }

    fn find_all(&self, _user_id: &str) -> Result<Vec<Interaction>> {
        Err(Error::StorageUnavailable("disk detached".to_string()))
    }

    fn ping(&self) -> Result<()> {
        Err(Error::StorageUnavailable("disk detached".to_string()))
    }
}

//! Interaction repository

use chrono::Local;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::DbPool;
use crate::{Error, Result};

/// Timestamp layout for stored interactions
///
/// Sorts lexicographically in chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One stored exchange between a user and the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub user_input: String,
    pub ai_response: String,
    pub timestamp: String,
}

impl Interaction {
    /// Create an interaction with an explicit timestamp
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        user_input: impl Into<String>,
        ai_response: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_input: user_input.into(),
            ai_response: ai_response.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Create an interaction stamped with the current local time
    #[must_use]
    pub fn now(
        user_id: impl Into<String>,
        user_input: impl Into<String>,
        ai_response: impl Into<String>,
    ) -> Self {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::new(user_id, user_input, ai_response, timestamp)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            user_input: row.get(1)?,
            ai_response: row.get(2)?,
            timestamp: row.get(3)?,
        })
    }
}

/// Persistence for conversation interactions
///
/// Callers in the turn path treat every method as best-effort.
pub trait InteractionStore: Send + Sync {
    /// Most recent interactions for a user, newest first, at most `limit`
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    fn find_recent(&self, user_id: &str, limit: usize) -> Result<Vec<Interaction>>;

    /// Append an interaction
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written
    fn insert(&self, interaction: &Interaction) -> Result<()>;

    /// Full history for a user, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    fn find_all(&self, user_id: &str) -> Result<Vec<Interaction>>;

    /// Check that the store is reachable
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached
    fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// `SQLite`-backed interaction store
#[derive(Clone)]
pub struct InteractionRepo {
    pool: DbPool,
}

impl InteractionRepo {
    /// Create a new interaction repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<super::DbConn> {
        self.pool
            .get()
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }
}

impl InteractionStore for InteractionRepo {
    fn find_recent(&self, user_id: &str, limit: usize) -> Result<Vec<Interaction>> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn
            .prepare(
                "SELECT user_id, user_input, ai_response, timestamp
                 FROM interactions WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let interactions = stmt
            .query_map(rusqlite::params![user_id, limit], Interaction::from_row)
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(interactions)
    }

    fn insert(&self, interaction: &Interaction) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO interactions (user_id, user_input, ai_response, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            [
                &interaction.user_id,
                &interaction.user_input,
                &interaction.ai_response,
                &interaction.timestamp,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(user_id = %interaction.user_id, "interaction stored");
        Ok(())
    }

    fn find_all(&self, user_id: &str) -> Result<Vec<Interaction>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT user_id, user_input, ai_response, timestamp
                 FROM interactions WHERE user_id = ?1
                 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let interactions = stmt
            .query_map([user_id], Interaction::from_row)
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(interactions)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| Error::Database(format!("query failed: {e}")))
    }
}

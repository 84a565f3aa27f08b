//! Chat history — persisted question/answer exchanges.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One question/answer exchange.
///
/// Created only after a successful generation call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Ordering key, strictly increasing in insertion order
    pub id: i64,

    /// Owner of the turn
    pub username: String,

    pub question: String,

    pub answer: String,

    pub created_at: DateTime<Utc>,
}

/// The core ChatHistoryStore trait.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Persist a turn and return it with its assigned ordering key.
    async fn append(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> Result<ChatTurn, StoreError>;

    /// All turns for a user, oldest first. Empty if none.
    async fn list(&self, username: &str) -> Result<Vec<ChatTurn>, StoreError>;

    /// Number of turns stored for a user.
    async fn count(&self, username: &str) -> Result<usize, StoreError>;

    /// Delete all turns for a user. Returns how many were removed.
    async fn clear(&self, username: &str) -> Result<usize, StoreError>;
}

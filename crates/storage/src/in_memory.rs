//! In-memory backend — useful for testing and ephemeral runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use docchat_core::error::StoreError;
use docchat_core::{ChatHistoryStore, ChatTurn, User, UserRepository};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    turns: Vec<ChatTurn>,
    next_id: i64,
}

/// A store that keeps accounts and turns in process memory.
///
/// Mirrors the SQLite backend's rules: usernames are unique and turns can
/// only be appended for registered users.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.username) {
            return Err(StoreError::Duplicate(user.username.clone()));
        }
        inner.users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(username).cloned())
    }

    async fn user_count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.users.len())
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> Result<ChatTurn, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(username) {
            return Err(StoreError::QueryFailed(format!("unknown user '{username}'")));
        }

        inner.next_id += 1;
        let turn = ChatTurn {
            id: inner.next_id,
            username: username.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: Utc::now(),
        };
        inner.turns.push(turn.clone());
        Ok(turn)
    }

    async fn list(&self, username: &str) -> Result<Vec<ChatTurn>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .turns
            .iter()
            .filter(|t| t.username == username)
            .cloned()
            .collect())
    }

    async fn count(&self, username: &str) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .turns
            .iter()
            .filter(|t| t.username == username)
            .count())
    }

    async fn clear(&self, username: &str) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.turns.len();
        inner.turns.retain(|t| t.username != username);
        Ok(before - inner.turns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn with_user(name: &str) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_user(&User::new(name, "hash")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn append_and_list() {
        let store = with_user("u").await;
        store.append("u", "q1", "a1").await.unwrap();
        store.append("u", "q2", "a2").await.unwrap();

        let turns = store.list("u").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].question, "q1");
        assert_eq!(turns[1].answer, "a2");
        assert!(turns[0].id < turns[1].id);
    }

    #[tokio::test]
    async fn empty_history_for_new_user() {
        let store = with_user("u").await;
        assert!(store.list("u").await.unwrap().is_empty());
        assert_eq!(store.count("u").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_user_keeps_first() {
        let store = with_user("u").await;
        let err = store.create_user(&User::new("u", "other")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.find_user("u").await.unwrap().unwrap().password_hash, "hash");
        assert_eq!(store.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_user_cannot_append() {
        let store = InMemoryStore::new();
        assert!(store.append("ghost", "q", "a").await.is_err());
    }

    #[tokio::test]
    async fn clear_and_shared_clone() {
        let store = with_user("u").await;
        let handle = store.clone();
        handle.append("u", "q", "a").await.unwrap();
        assert_eq!(store.count("u").await.unwrap(), 1);
        assert_eq!(store.clear("u").await.unwrap(), 1);
        assert_eq!(handle.count("u").await.unwrap(), 0);
    }
}

//! SQLite backend for users and chat history.
//!
//! Uses a single SQLite database file with two tables:
//! - `users` — one row per account, keyed by username
//! - `chat_history` — question/answer turns, ordered by an autoincrement id
//!
//! Timestamps are stored as RFC 3339 text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docchat_core::error::StoreError;
use docchat_core::{ChatHistoryStore, ChatTurn, User, UserRepository};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite store for accounts and chat history.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Accepts a plain file path or a `sqlite:` URL. Pass `"sqlite::memory:"`
    /// for an ephemeral database (useful for tests). Plain paths are used
    /// verbatim, so `%` and `?` are ordinary file name characters. Missing
    /// parent directories are created.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = if path.starts_with("sqlite:") {
            if !path.contains(":memory:") {
                let file = path
                    .trim_start_matches("sqlite://")
                    .trim_start_matches("sqlite:");
                let file = file.split('?').next().unwrap_or(file);
                create_parent_dir(Path::new(file))?;
            }
            SqliteConnectOptions::from_str(path)
                .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
        } else {
            create_parent_dir(Path::new(path))?;
            SqliteConnectOptions::new().filename(path)
        };

        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist yet.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username      TEXT PRIMARY KEY NOT NULL,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                username   TEXT NOT NULL REFERENCES users(username),
                question   TEXT NOT NULL,
                answer     TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_history table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_history_user ON chat_history(username, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_history index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, StoreError> {
        let username: String = row
            .try_get("username")
            .map_err(|e| StoreError::QueryFailed(format!("username column: {e}")))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| StoreError::QueryFailed(format!("password_hash column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(User {
            username,
            password_hash,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ChatTurn, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let username: String = row
            .try_get("username")
            .map_err(|e| StoreError::QueryFailed(format!("username column: {e}")))?;
        let question: String = row
            .try_get("question")
            .map_err(|e| StoreError::QueryFailed(format!("question column: {e}")))?;
        let answer: String = row
            .try_get("answer")
            .map_err(|e| StoreError::QueryFailed(format!("answer column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(ChatTurn {
            id,
            username,
            question,
            answer,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

fn create_parent_dir(file: &Path) -> Result<(), StoreError> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoreError::Storage(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(user.username.clone()))
            }
            Err(e) => Err(StoreError::QueryFailed(format!("insert user: {e}"))),
        }
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT username, password_hash, created_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("find user: {e}")))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn user_count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("count users: {e}")))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl ChatHistoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> Result<ChatTurn, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO chat_history (username, question, answer, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(username)
        .bind(question)
        .bind(answer)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::QueryFailed(format!("unknown user '{username}'"))
            }
            e => StoreError::QueryFailed(format!("append turn: {e}")),
        })?;

        Ok(ChatTurn {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            created_at,
        })
    }

    async fn list(&self, username: &str) -> Result<Vec<ChatTurn>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, username, question, answer, created_at FROM chat_history WHERE username = ?1 ORDER BY id ASC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list history: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn count(&self, username: &str) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_history WHERE username = ?1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("count history: {e}")))?;
        Ok(count as usize)
    }

    async fn clear(&self, username: &str) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM chat_history WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("clear history: {e}")))?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    async fn with_user(name: &str) -> SqliteStore {
        let store = test_store().await;
        store.create_user(&User::new(name, "$argon2id$hash")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn plain_path_is_taken_literally() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("odd%20dir?mode=ro").join("users.db");
        let raw = db.to_str().unwrap();

        {
            let store = SqliteStore::new(raw).await.unwrap();
            store.create_user(&User::new("alice", "h1")).await.unwrap();
        }
        assert!(db.exists());

        let reopened = SqliteStore::new(raw).await.unwrap();
        assert!(reopened.find_user("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let store = test_store().await;
        store.create_user(&User::new("alice", "h1")).await.unwrap();

        let found = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert_eq!(found.password_hash, "h1");
        assert!(store.find_user("bob").await.unwrap().is_none());
        assert_eq!(store.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_user_is_rejected_without_overwrite() {
        let store = test_store().await;
        store.create_user(&User::new("alice", "h1")).await.unwrap();

        let err = store.create_user(&User::new("alice", "h2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref u) if u == "alice"));

        let found = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "h1");
    }

    #[tokio::test]
    async fn append_and_list_in_order() {
        let store = with_user("u").await;
        let t1 = store.append("u", "q1", "a1").await.unwrap();
        let t2 = store.append("u", "q2", "a2").await.unwrap();
        assert!(t2.id > t1.id);

        let turns = store.list("u").await.unwrap();
        let pairs: Vec<(&str, &str)> = turns
            .iter()
            .map(|t| (t.question.as_str(), t.answer.as_str()))
            .collect();
        assert_eq!(pairs, vec![("q1", "a1"), ("q2", "a2")]);
    }

    #[tokio::test]
    async fn list_is_per_user() {
        let store = with_user("u").await;
        store.create_user(&User::new("v", "h")).await.unwrap();
        store.append("u", "q1", "a1").await.unwrap();
        store.append("v", "other", "answer").await.unwrap();

        assert_eq!(store.list("u").await.unwrap().len(), 1);
        assert_eq!(store.count("v").await.unwrap(), 1);
        assert!(store.list("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_for_unknown_user_fails() {
        let store = test_store().await;
        let err = store.append("ghost", "q", "a").await.unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn clear_removes_only_that_user() {
        let store = with_user("u").await;
        store.create_user(&User::new("v", "h")).await.unwrap();
        store.append("u", "q1", "a1").await.unwrap();
        store.append("u", "q2", "a2").await.unwrap();
        store.append("v", "q", "a").await.unwrap();

        assert_eq!(store.clear("u").await.unwrap(), 2);
        assert_eq!(store.count("u").await.unwrap(), 0);
        assert_eq!(store.count("v").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::new(path).await.unwrap();
            store.create_user(&User::new("alice", "h1")).await.unwrap();
            store.append("alice", "What is it?", "A report.").await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteStore::new(path).await.unwrap();
        assert!(reopened.find_user("alice").await.unwrap().is_some());
        let turns = reopened.list("alice").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].answer, "A report.");
    }

    #[tokio::test]
    async fn from_pool_runs_migrations() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool).await.unwrap();
        assert_eq!(store.user_count().await.unwrap(), 0);
        assert_eq!(store.name(), "sqlite");
    }
}

//! User accounts and the capabilities that back them.
//!
//! A [`User`] is only ever stored with its password hash. Hashing is
//! delegated to a [`HashingService`]; persistence to a [`UserRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, HashError, StoreError};

/// Maximum username length in characters.
pub const MAX_USERNAME_LEN: usize = 64;

/// Maximum password length in bytes.
pub const MAX_PASSWORD_LEN: usize = 1024;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier chosen at registration
    pub username: String,

    /// Opaque PHC-format hash, never the plaintext
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

/// Normalize and validate a username.
///
/// Leading/trailing whitespace is stripped. The result must be 1–64 chars of
/// ASCII letters, digits, `_`, `.`, `@` or `-`.
pub fn normalize_username(raw: &str) -> Result<String, Error> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Username must not be empty.".into()));
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::InvalidInput(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters."
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'))
    {
        return Err(Error::InvalidInput(
            "Username may only contain letters, digits, '_', '.', '@' and '-'.".into(),
        ));
    }
    Ok(name.to_string())
}

/// Validate a password before hashing. Passwords are not trimmed.
pub fn validate_password(password: &str) -> Result<(), Error> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password must not be empty.".into()));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at most {MAX_PASSWORD_LEN} bytes."
        )));
    }
    Ok(())
}

/// Password hashing capability.
///
/// Implementations must salt every hash and use a slow, memory-hard
/// primitive (Argon2, scrypt, bcrypt).
pub trait HashingService: Send + Sync {
    /// Hash a plaintext password into a self-describing string.
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// Check a plaintext password against a stored hash.
    ///
    /// Malformed hashes verify as `false`.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Persistence for user accounts.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with [`StoreError::Duplicate`] if the
    /// username is taken; an existing row is never overwritten.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Look a user up by exact username.
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Number of registered users.
    async fn user_count(&self) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_trimmed() {
        assert_eq!(normalize_username("  alice ").unwrap(), "alice");
    }

    #[test]
    fn username_rejects_empty_and_odd_chars() {
        assert!(normalize_username("   ").is_err());
        assert!(normalize_username("al ice").is_err());
        assert!(normalize_username("bob;drop").is_err());
        assert!(normalize_username("carol.smith@example-1").is_ok());
    }

    #[test]
    fn username_length_limit() {
        let long = "a".repeat(MAX_USERNAME_LEN + 1);
        assert!(normalize_username(&long).is_err());
        assert!(normalize_username(&long[..MAX_USERNAME_LEN]).is_ok());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("").is_err());
        assert!(validate_password(" ").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LEN + 1)).is_err());
    }

    #[test]
    fn user_serialization_omits_hash() {
        let user = User::new("alice", "$argon2id$v=19$secret");
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice"));
        assert!(!json.contains("argon2id"));
    }
}

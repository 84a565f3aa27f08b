//! Credential store — registration and password verification.
//!
//! Sits between the session controller and the user repository so that
//! plaintext passwords never leave this module. Hashing runs on the blocking
//! pool since Argon2 is deliberately slow.

use std::sync::{Arc, OnceLock};

use docchat_core::error::{Error, HashError, StoreError};
use docchat_core::user::{normalize_username, validate_password};
use docchat_core::{HashingService, User, UserRepository};

/// Registers users and checks their passwords.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn HashingService>,
    dummy_hash: Arc<OnceLock<Option<String>>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn HashingService>) -> Self {
        Self {
            users,
            hasher,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Create a new account.
    ///
    /// The username is trimmed and validated. Fails with
    /// [`Error::DuplicateUser`] if it is already taken; the existing
    /// account is left untouched.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, Error> {
        let username = normalize_username(username)?;
        validate_password(password)?;

        if self.users.find_user(&username).await?.is_some() {
            return Err(Error::DuplicateUser(username));
        }

        let hash = self.hash_blocking(password.to_string()).await?;
        let user = User::new(username.clone(), hash);

        // Two concurrent registrations can both pass the lookup above; the
        // repository's uniqueness constraint decides the winner.
        match self.users.create_user(&user).await {
            Ok(()) => {
                tracing::info!(username = %username, "User registered");
                Ok(user)
            }
            Err(StoreError::Duplicate(_)) => Err(Error::DuplicateUser(username)),
            Err(e) => Err(e.into()),
        }
    }

    /// Check a username/password pair.
    ///
    /// Unknown users verify as `false`, the same as a wrong password.
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, Error> {
        Ok(self.check(username, password).await?.is_some())
    }

    /// Like [`verify`](Self::verify) but returns the account, failing with
    /// [`Error::InvalidCredentials`] for an unknown user or a wrong password.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, Error> {
        self.check(username, password)
            .await?
            .ok_or(Error::InvalidCredentials)
    }

    // Unknown users are still run through a hash verification so the two
    // failure cases take comparable time.
    async fn check(&self, username: &str, password: &str) -> Result<Option<User>, Error> {
        let Ok(username) = normalize_username(username) else {
            return Ok(None);
        };

        match self.users.find_user(&username).await? {
            Some(user) => {
                let ok = self
                    .verify_blocking(password.to_string(), user.password_hash.clone())
                    .await?;
                Ok(ok.then_some(user))
            }
            None => {
                if let Some(dummy) = self.dummy_hash().await {
                    let _ = self.verify_blocking(password.to_string(), dummy).await;
                }
                Ok(None)
            }
        }
    }

    /// Whether an account with this username exists.
    pub async fn exists(&self, username: &str) -> Result<bool, Error> {
        let Ok(username) = normalize_username(username) else {
            return Ok(false);
        };
        Ok(self.users.find_user(&username).await?.is_some())
    }

    pub async fn user_count(&self) -> Result<usize, Error> {
        Ok(self.users.user_count().await?)
    }

    async fn dummy_hash(&self) -> Option<String> {
        if let Some(h) = self.dummy_hash.get() {
            return h.clone();
        }
        let computed = self
            .hash_blocking("docchat-timing-equalizer".to_string())
            .await
            .ok();
        self.dummy_hash.get_or_init(|| computed).clone()
    }

    async fn hash_blocking(&self, password: String) -> Result<String, HashError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashError::Failed(e.to_string()))?
    }

    async fn verify_blocking(&self, password: String, hash: String) -> Result<bool, HashError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| HashError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Argon2Hasher;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapRepo {
        users: Mutex<HashMap<String, User>>,
    }

    #[async_trait]
    impl UserRepository for MapRepo {
        async fn create_user(&self, user: &User) -> Result<(), StoreError> {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(&user.username) {
                return Err(StoreError::Duplicate(user.username.clone()));
            }
            users.insert(user.username.clone(), user.clone());
            Ok(())
        }

        async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
            Ok(self.users.lock().unwrap().get(username).cloned())
        }

        async fn user_count(&self) -> Result<usize, StoreError> {
            Ok(self.users.lock().unwrap().len())
        }
    }

    fn store() -> (CredentialStore, Arc<MapRepo>) {
        let repo = Arc::new(MapRepo::default());
        let store = CredentialStore::new(repo.clone(), Arc::new(Argon2Hasher::new()));
        (store, repo)
    }

    #[tokio::test]
    async fn register_then_verify() {
        let (store, repo) = store();
        store.register("u1", "p1").await.unwrap();

        assert!(store.verify("u1", "p1").await.unwrap());
        assert!(!store.verify("u1", "wrong").await.unwrap());

        let user = store.authenticate("u1", "p1").await.unwrap();
        assert_eq!(user.username, "u1");
        assert!(matches!(
            store.authenticate("u1", "wrong").await,
            Err(Error::InvalidCredentials)
        ));

        let stored = repo.find_user("u1").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "p1");
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_original() {
        let (store, _) = store();
        store.register("u1", "p1").await.unwrap();

        let err = store.register("u1", "p2").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateUser(ref u) if u == "u1"));

        assert!(store.verify("u1", "p1").await.unwrap());
        assert!(!store.verify("u1", "p2").await.unwrap());
        assert_eq!(store.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_invalid_credentials() {
        let (store, _) = store();
        assert!(!store.verify("ghost", "whatever").await.unwrap());
        assert!(matches!(
            store.authenticate("ghost", "whatever").await,
            Err(Error::InvalidCredentials)
        ));
        // Malformed names never reach the repository
        assert!(!store.verify("bad name", "x").await.unwrap());
    }

    #[tokio::test]
    async fn username_is_normalized() {
        let (store, _) = store();
        store.register("  alice ", "pw").await.unwrap();
        assert!(store.exists("alice").await.unwrap());
        assert!(store.verify("alice", "pw").await.unwrap());
        assert!(matches!(
            store.register("alice", "other").await,
            Err(Error::DuplicateUser(_))
        ));
    }

    #[tokio::test]
    async fn invalid_input_rejected_before_storage() {
        let (store, repo) = store();
        assert!(matches!(
            store.register("", "pw").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            store.register("bob", "").await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(repo.user_count().await.unwrap(), 0);
    }
}

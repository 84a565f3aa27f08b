//! Security module for DocChat — password hashing, credentials, and audit logging.
//!
//! Provides:
//! - **Hashing**: Argon2id implementation of `HashingService`
//! - **Credentials**: Registration and login checks over a `UserRepository`
//! - **Audit logging**: Structured account event logging

pub mod audit;
pub mod credentials;
pub mod hashing;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use credentials::CredentialStore;
pub use hashing::Argon2Hasher;

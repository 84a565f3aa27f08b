//! Persistence for DocChat: user accounts and chat history.
//!
//! Both backends implement `UserRepository` and `ChatHistoryStore`, so one
//! store instance serves the credential store and the session controller.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

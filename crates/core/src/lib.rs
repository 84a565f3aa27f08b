//! # DocChat Core
//!
//! Domain types, traits, and error definitions for DocChat.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod document;
pub mod error;
pub mod generation;
pub mod history;
pub mod session;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use document::DocumentContext;
pub use error::{DocumentError, Error, GenerationError, HashError, Result, StoreError};
pub use generation::GenerationService;
pub use history::{ChatHistoryStore, ChatTurn};
pub use session::{Session, SessionState};
pub use user::{HashingService, User, UserRepository};

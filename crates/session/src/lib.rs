//! Session orchestration for DocChat.
//!
//! - [`PromptAssembler`] turns document text, prior turns and a question into
//!   one prompt string.
//! - [`SessionController`] drives the login → upload → ask flow on top of the
//!   credential store, the ingestor, the generation service and the history
//!   store.

pub mod assembler;
pub mod controller;

pub use assembler::{PromptAssembler, build_prompt};
pub use controller::SessionController;

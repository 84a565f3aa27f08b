//! Generation service implementations for DocChat.
//!
//! All providers implement the `docchat_core::GenerationService` trait.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiClientBuilder};

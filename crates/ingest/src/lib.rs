//! Document ingestion for DocChat.
//!
//! Turns uploaded PDF bytes into a [`DocumentContext`](docchat_core::DocumentContext):
//! page text in reading order plus a SHA-256 fingerprint of the upload.
//! No persistence, no network.

pub mod pdf;

pub use pdf::{DEFAULT_MAX_UPLOAD_BYTES, PdfIngestor};

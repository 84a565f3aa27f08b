//! Session — the per-user, in-memory state of one interactive run.
//!
//! A `Session` is a plain value passed to and returned from the session
//! controller. It is never persisted and never global.
//!
//! ```text
//! LoggedOut ──login──▶ LoggedIn ──upload──▶ DocumentLoaded ◀──┐
//!     ▲                    │                    │   ask ──────┘
//!     └──────logout────────┴────────logout──────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::DocumentContext;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
    DocumentLoaded,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::LoggedOut => "logged_out",
            SessionState::LoggedIn => "logged_in",
            SessionState::DocumentLoaded => "document_loaded",
        };
        f.write_str(s)
    }
}

/// Authenticated user plus the currently loaded document.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<String>,
    document: Option<Arc<DocumentContext>>,
    logged_in_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh, logged-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session authenticated as `username`, with no document.
    pub fn authenticated(username: impl Into<String>) -> Self {
        Self {
            user: Some(username.into()),
            document: None,
            logged_in_at: Some(Utc::now()),
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.user, &self.document) {
            (None, _) => SessionState::LoggedOut,
            (Some(_), None) => SessionState::LoggedIn,
            (Some(_), Some(_)) => SessionState::DocumentLoaded,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn document(&self) -> Option<&Arc<DocumentContext>> {
        self.document.as_ref()
    }

    pub fn logged_in_at(&self) -> Option<DateTime<Utc>> {
        self.logged_in_at
    }

    /// Replace the loaded document. Ignored when logged out.
    pub fn load_document(&mut self, document: Arc<DocumentContext>) {
        if self.user.is_some() {
            self.document = Some(document);
        }
    }

    /// Drop the user and document.
    pub fn logout(&mut self) {
        self.user = None;
        self.document = None;
        self.logged_in_at = None;
    }
}

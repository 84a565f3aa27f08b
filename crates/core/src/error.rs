//! Error types for the DocChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! is what the session controller hands to the presentation layer.

use thiserror::Error;

/// The top-level error type for all DocChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Authentication ---
    #[error("User already exists: {0}")]
    DuplicateUser(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("No user is logged in")]
    NotLoggedIn,

    // --- Session flow ---
    #[error("No document loaded in this session")]
    NoDocument,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Bounded contexts ---
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] HashError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A message safe to show to the end user.
    ///
    /// Internal details (SQL errors, upstream response bodies) stay in the
    /// logs; the user gets a short actionable sentence.
    pub fn user_message(&self) -> String {
        match self {
            Error::DuplicateUser(_) => {
                "Username already exists. Please choose a different one.".into()
            }
            Error::InvalidCredentials => "Invalid username or password.".into(),
            Error::NotLoggedIn => "Please log in first.".into(),
            Error::NoDocument => "Please upload a document first.".into(),
            Error::InvalidInput(msg) => msg.clone(),
            Error::Document(e) => match e {
                DocumentError::TooLarge { limit, .. } => {
                    format!("The document is too large (limit is {limit} bytes).")
                }
                DocumentError::NoText => {
                    "No text could be extracted from the document. It may be scanned or image-only."
                        .into()
                }
                DocumentError::Unreadable(_) => {
                    "The uploaded file could not be read as a PDF document.".into()
                }
            },
            Error::Generation(e) => match e {
                GenerationError::AuthenticationFailed(_) => {
                    "The AI service rejected the API key. Check your configuration.".into()
                }
                GenerationError::RateLimited { .. } => {
                    "The AI service is rate limiting requests. Please try again shortly.".into()
                }
                GenerationError::Timeout(_) => "The AI service did not respond in time.".into(),
                GenerationError::Blocked(reason) => {
                    format!("The AI service declined to answer ({reason}).")
                }
                _ => format!("An error occurred while generating the answer: {e}"),
            },
            Error::Store(_) | Error::Hashing(_) => {
                "A storage error occurred. Please try again.".into()
            }
            Error::Config { message } => format!("Configuration error: {message}"),
        }
    }
}

// --- Bounded context errors ---

/// Failures of the external text-generation service.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("Provider returned no text")]
    EmptyResponse,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures while turning an uploaded file into text.
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("Unreadable document: {0}")]
    Unreadable(String),

    #[error("Document contains no extractable text")]
    NoText,

    #[error("Document is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum HashError {
    #[error("Hashing failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_displays_correctly() {
        let err = Error::Generation(GenerationError::ApiError {
            status_code: 503,
            message: "Service unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service unavailable"));
    }

    #[test]
    fn credentials_message_does_not_reveal_which_part_failed() {
        let msg = Error::InvalidCredentials.user_message();
        assert_eq!(msg, "Invalid username or password.");
    }

    #[test]
    fn store_details_are_not_shown_to_users() {
        let err = Error::Store(StoreError::QueryFailed("no such table: users".into()));
        assert!(!err.user_message().contains("users"));
        assert!(err.to_string().contains("no such table"));
    }

    #[test]
    fn document_errors_convert() {
        let err: Error = DocumentError::TooLarge { size: 10, limit: 5 }.into();
        assert!(matches!(err, Error::Document(DocumentError::TooLarge { .. })));
        assert!(err.user_message().contains('5'));
    }

    #[test]
    fn auth_failure_message_mentions_configuration() {
        let err: Error = GenerationError::AuthenticationFailed("bad key".into()).into();
        assert!(err.user_message().contains("API key"));
    }
}

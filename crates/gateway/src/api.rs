//! Route handlers and the HTTP error mapping.

use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use docchat_core::error::{DocumentError, GenerationError};
use docchat_core::{ChatTurn, Error, Session, SessionState};
use docchat_security::{AuditEvent, AuditOutcome};

use crate::{SessionToken, SharedState};

// --- Errors ---

/// An error rendered as `{"error": <code>, "message": <user message>}`.
#[derive(Debug)]
pub enum ApiError {
    /// A controller error
    Domain(Error),
    /// Session vanished between auth and handler (logout race, expiry)
    SessionGone,
    RateLimited,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Domain(e)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::SessionGone => (StatusCode::UNAUTHORIZED, "session_expired"),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            ApiError::Domain(e) => match e {
                Error::DuplicateUser(_) => (StatusCode::CONFLICT, "duplicate_user"),
                Error::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
                Error::NotLoggedIn => (StatusCode::UNAUTHORIZED, "not_logged_in"),
                Error::NoDocument => (StatusCode::CONFLICT, "no_document"),
                Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                Error::Document(DocumentError::TooLarge { .. }) => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "document_too_large")
                }
                Error::Document(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unreadable_document"),
                Error::Generation(GenerationError::Timeout(_)) => {
                    (StatusCode::GATEWAY_TIMEOUT, "generation_timeout")
                }
                Error::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
                Error::Store(_) | Error::Hashing(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "store_error")
                }
                Error::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Domain(e) => e.user_message(),
            ApiError::SessionGone => "Your session has ended. Please log in again.".into(),
            ApiError::RateLimited => "Too many login attempts. Please wait a minute.".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            if let ApiError::Domain(e) = &self {
                error!(error = %e, "Request failed");
            }
        }
        let body = ErrorBody {
            error: code.into(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

// --- DTOs ---

#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub source_name: Option<String>,
    pub pages: usize,
    pub chars: usize,
    pub sha256: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub turns: Vec<ChatTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub username: Option<String>,
    pub state: String,
    pub document: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    generator: String,
}

// --- Helpers ---

/// Snapshot of the caller's session. Cloning is cheap: the document is
/// shared behind an `Arc`, and no lock is held across the slow calls.
async fn current_session(state: &SharedState, token: &SessionToken) -> Result<Session, ApiError> {
    state
        .sessions
        .read()
        .await
        .get(&token.0)
        .map(|e| e.session.clone())
        .ok_or(ApiError::SessionGone)
}

// --- Handlers ---

pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        generator: state.controller.generator().name().to_string(),
    })
}

pub async fn register_handler(
    State(state): State<SharedState>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let user = state
        .controller
        .register(&payload.username, &payload.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: user.username,
        }),
    ))
}

pub async fn login_handler(
    State(state): State<SharedState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    let key = payload.username.trim().to_lowercase();
    if state.login_limiter.is_limited(&key) {
        state.controller.audit().log(
            AuditEvent::AuthFailure {
                reason: "login rate limit".into(),
            },
            &key,
            AuditOutcome::Denied,
            None,
        );
        warn!(username = %key, "Login rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    let session = match state
        .controller
        .login(&payload.username, &payload.password)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            if matches!(e, Error::InvalidCredentials) {
                state.login_limiter.record_failure(&key);
            }
            return Err(e.into());
        }
    };
    state.login_limiter.reset(&key);
    let username = session.username().unwrap_or_default().to_string();
    let token = state.open_session(session).await;

    Ok(Json(LoginResponse {
        token,
        username,
        expires_in_secs: state.session_ttl.as_secs(),
    }))
}

pub async fn logout_handler(
    State(state): State<SharedState>,
    Extension(token): Extension<SessionToken>,
) -> StatusCode {
    let entry = state.sessions.write().await.remove(&token.0);
    if let Some(mut entry) = entry {
        state.controller.logout(&mut entry.session);
    }
    StatusCode::NO_CONTENT
}

pub async fn document_handler(
    State(state): State<SharedState>,
    Extension(token): Extension<SessionToken>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DocumentResponse>, ApiError> {
    let source_name = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let mut session = current_session(&state, &token).await?;
    let document = state
        .controller
        .upload_document(&mut session, body.to_vec(), source_name)
        .await?;

    // Write back only if the session still exists (no logout in between)
    match state.sessions.write().await.get_mut(&token.0) {
        Some(entry) => entry.session.load_document(document.clone()),
        None => return Err(ApiError::SessionGone),
    }

    Ok(Json(DocumentResponse {
        source_name: document.source_name.clone(),
        pages: document.page_count,
        chars: document.char_count(),
        sha256: document.sha256.clone(),
    }))
}

pub async fn ask_handler(
    State(state): State<SharedState>,
    Extension(token): Extension<SessionToken>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<ChatTurn>, ApiError> {
    let session = current_session(&state, &token).await?;
    let turn = state.controller.ask(&session, &payload.question).await?;
    Ok(Json(turn))
}

pub async fn history_handler(
    State(state): State<SharedState>,
    Extension(token): Extension<SessionToken>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = current_session(&state, &token).await?;
    let turns = state.controller.history(&session).await?;
    Ok(Json(HistoryResponse { turns }))
}

pub async fn session_handler(
    State(state): State<SharedState>,
    Extension(token): Extension<SessionToken>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = current_session(&state, &token).await?;
    let state_name = match session.state() {
        SessionState::LoggedOut => "logged_out",
        SessionState::LoggedIn => "logged_in",
        SessionState::DocumentLoaded => "document_loaded",
    };
    Ok(Json(SessionResponse {
        username: session.username().map(String::from),
        state: state_name.into(),
        document: session.document().map(|d| d.label()),
    }))
}

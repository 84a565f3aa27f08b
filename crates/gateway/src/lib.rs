//! HTTP API gateway for DocChat.
//!
//! Exposes the session controller over REST: register, login (returns a
//! bearer token), document upload, ask, history and logout. Sessions live in
//! memory keyed by token and expire after a period of inactivity.
//!
//! Built on Axum.

pub mod api;
pub mod rate_limit;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::{
    Router,
    extract::State,
    middleware::{self, Next},
    routing::{get, post},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use docchat_config::AppConfig;
use docchat_core::Session;
use docchat_security::{AuditEvent, AuditOutcome};
use docchat_session::SessionController;

pub use api::ApiError;
pub use rate_limit::RateLimiter;

/// Upper bound on concurrently held sessions; the least recently used is
/// evicted when full.
const MAX_SESSIONS: usize = 10_000;

/// A logged-in session plus its last activity time.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session: Session,
    pub last_seen: Instant,
}

/// Shared application state for the gateway.
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub sessions: RwLock<HashMap<String, SessionEntry>>,
    pub session_ttl: Duration,
    /// Failed logins per normalized username
    pub login_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(controller: Arc<SessionController>, session_ttl: Duration) -> Self {
        Self {
            controller,
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
            login_limiter: RateLimiter::new(10, Duration::from_secs(60)),
        }
    }

    /// Store a new session and return its bearer token.
    pub async fn open_session(&self, session: Session) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.write().await;

        if sessions.len() >= MAX_SESSIONS {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(k, _)| k.clone())
            {
                sessions.remove(&oldest);
            }
        }

        sessions.insert(
            token.clone(),
            SessionEntry {
                session,
                last_seen: Instant::now(),
            },
        );
        token
    }

    /// Drop sessions idle for longer than the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| now.duration_since(e.last_seen) < self.session_ttl);
        before - sessions.len()
    }
}

/// Token of the authenticated session, attached to the request by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Build the router with all gateway routes.
///
/// Security layers applied:
/// - Bearer token authentication on session routes
/// - CORS restricted to the gateway's own localhost origins
/// - Request body size limit (the document upload limit)
/// - HTTP trace logging
pub fn build_router(state: SharedState, port: u16, max_body_bytes: usize) -> Router {
    let authed = Router::new()
        .route("/logout", post(api::logout_handler))
        .route("/document", post(api::document_handler))
        .route("/ask", post(api::ask_handler))
        .route("/history", get(api::history_handler))
        .route("/session", get(api::session_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let origins: Vec<HeaderValue> = [
        format!("http://localhost:{port}"),
        format!("http://127.0.0.1:{port}"),
    ]
    .iter()
    .filter_map(|o| HeaderValue::from_str(o).ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-filename"),
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/register", post(api::register_handler))
        .route("/login", post(api::login_handler))
        .merge(authed)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and run until Ctrl-C.
pub async fn start(
    config: AppConfig,
    controller: Arc<SessionController>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let ttl = Duration::from_secs(config.gateway.session_ttl_minutes.max(1) * 60);
    let state = Arc::new(AppState::new(controller, ttl));

    // Periodic sweep of idle sessions
    let sweeper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let removed = state.purge_expired().await;
                if removed > 0 {
                    debug!(removed, "Expired idle sessions");
                }
            }
        })
    };

    let app = build_router(
        state,
        config.gateway.port,
        config.documents.max_upload_bytes,
    );

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    sweeper.abort();
    Ok(())
}

/// Authentication middleware for session routes.
///
/// Requires `Authorization: Bearer <token>` naming a live session. Refreshes
/// the session's idle timer and attaches [`SessionToken`] to the request.
async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let Some(token) = token else {
        warn!(path = %req.uri().path(), "Missing bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    {
        let mut sessions = state.sessions.write().await;
        let now = Instant::now();
        let expired = match sessions.get_mut(&token) {
            Some(entry) => {
                let fresh = now.duration_since(entry.last_seen) < state.session_ttl;
                if fresh {
                    entry.last_seen = now;
                }
                !fresh
            }
            None => {
                state.controller.audit().log(
                    AuditEvent::AuthFailure {
                        reason: "unknown bearer token".into(),
                    },
                    "anonymous",
                    AuditOutcome::Denied,
                    None,
                );
                warn!(path = %req.uri().path(), "Unknown bearer token");
                return Err(StatusCode::UNAUTHORIZED);
            }
        };

        if expired {
            sessions.remove(&token);
            debug!("Rejected expired session token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    req.extensions_mut().insert(SessionToken(token));
    Ok(next.run(req).await)
}

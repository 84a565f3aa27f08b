//! Session controller — the login → upload → ask flow.
//!
//! The controller owns no per-user state. Callers hold a [`Session`] value
//! and pass it in; the controller validates the state transition, talks to
//! the collaborators and hands back results or a typed [`Error`].

use std::sync::Arc;

use docchat_core::{
    ChatHistoryStore, ChatTurn, DocumentContext, Error, GenerationService, Result, Session, User,
};
use docchat_ingest::PdfIngestor;
use docchat_security::{AuditEvent, AuditLogger, AuditOutcome, CredentialStore};
use tracing::{debug, info, warn};

use crate::assembler::PromptAssembler;

/// Orchestrates authentication, document upload and question answering.
pub struct SessionController {
    credentials: CredentialStore,
    history: Arc<dyn ChatHistoryStore>,
    generator: Arc<dyn GenerationService>,
    ingestor: PdfIngestor,
    assembler: PromptAssembler,
    audit: Arc<AuditLogger>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("history", &self.history.name())
            .field("generator", &self.generator.name())
            .field("ingestor", &self.ingestor)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Create a controller with the default ingestor, preamble and a
    /// tracing-backed audit log.
    pub fn new(
        credentials: CredentialStore,
        history: Arc<dyn ChatHistoryStore>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        Self {
            credentials,
            history,
            generator,
            ingestor: PdfIngestor::default(),
            assembler: PromptAssembler::default(),
            audit: Arc::new(AuditLogger::tracing()),
        }
    }

    pub fn with_ingestor(mut self, ingestor: PdfIngestor) -> Self {
        self.ingestor = ingestor;
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn generator(&self) -> &Arc<dyn GenerationService> {
        &self.generator
    }

    /// Create an account. Does not log the new user in.
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        match self.credentials.register(username, password).await {
            Ok(user) => {
                self.audit.log(
                    AuditEvent::Registration,
                    &user.username,
                    AuditOutcome::Success,
                    None,
                );
                Ok(user)
            }
            Err(e) => {
                self.audit.log(
                    AuditEvent::Registration,
                    username.trim(),
                    AuditOutcome::Failure,
                    Some(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Check credentials and open a session with no document.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        match self.credentials.authenticate(username, password).await {
            Ok(user) => {
                self.audit.log(
                    AuditEvent::LoginAttempt,
                    &user.username,
                    AuditOutcome::Success,
                    None,
                );
                info!(username = %user.username, "User logged in");
                Ok(Session::authenticated(user.username))
            }
            Err(e) => {
                self.audit.log(
                    AuditEvent::LoginAttempt,
                    username.trim(),
                    AuditOutcome::Failure,
                    Some(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Extract text from an uploaded PDF and make it the session's document,
    /// replacing any previous one. On failure the session is unchanged.
    pub async fn upload_document(
        &self,
        session: &mut Session,
        bytes: Vec<u8>,
        source_name: Option<String>,
    ) -> Result<Arc<DocumentContext>> {
        let username = session.username().ok_or(Error::NotLoggedIn)?.to_string();

        let document = Arc::new(self.ingestor.ingest(bytes, source_name).await?);
        session.load_document(Arc::clone(&document));

        info!(
            username = %username,
            document = %document.label(),
            pages = document.page_count,
            chars = document.char_count(),
            "Document loaded"
        );
        Ok(document)
    }

    /// Answer a question about the loaded document.
    ///
    /// The new turn is persisted only after the generation service answers;
    /// any failure leaves the history untouched.
    pub async fn ask(&self, session: &Session, question: &str) -> Result<ChatTurn> {
        let username = session.username().ok_or(Error::NotLoggedIn)?;
        let document = session.document().ok_or(Error::NoDocument)?;

        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("Question must not be empty.".into()));
        }

        let prior = self.history.list(username).await?;
        let prompt = self.assembler.build(&document.raw_text, &prior, question);

        debug!(
            username = %username,
            prior_turns = prior.len(),
            prompt_chars = prompt.len(),
            generator = %self.generator.name(),
            "Requesting answer"
        );

        let answer = self.generator.generate(&prompt).await.map_err(|e| {
            warn!(username = %username, error = %e, "Generation failed");
            e
        })?;

        let turn = self.history.append(username, question, &answer).await?;
        info!(username = %username, turn_id = turn.id, "Answered question");
        Ok(turn)
    }

    /// All turns for the session's user, oldest first.
    pub async fn history(&self, session: &Session) -> Result<Vec<ChatTurn>> {
        let username = session.username().ok_or(Error::NotLoggedIn)?;
        Ok(self.history.list(username).await?)
    }

    /// Delete the session user's history. Returns how many turns were removed.
    pub async fn clear_history(&self, session: &Session) -> Result<usize> {
        let username = session.username().ok_or(Error::NotLoggedIn)?;
        let removed = self.history.clear(username).await?;
        info!(username = %username, removed, "History cleared");
        Ok(removed)
    }

    /// End the session. A no-op for a session that is already logged out.
    pub fn logout(&self, session: &mut Session) {
        if let Some(username) = session.username() {
            self.audit
                .log(AuditEvent::Logout, username, AuditOutcome::Success, None);
            info!(username = %username, "User logged out");
        }
        session.logout();
    }
}

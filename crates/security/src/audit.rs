//! Audit logging — structured account event logging.
//!
//! Records registrations, login attempts and logouts. Entries never carry
//! passwords or hashes, only the username that was presented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Entries kept in memory before the oldest are dropped.
const MAX_ENTRIES: usize = 1000;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

/// Types of auditable account events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// New account registration
    Registration,
    /// Username/password check
    LoginAttempt,
    /// Session was ended
    Logout,
    /// Request rejected before reaching the session (bad token, rate limit)
    AuthFailure { reason: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

/// Trait for audit log sinks (where events are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// In-memory audit logger that keeps the most recent entries and forwards
/// each one to its sinks.
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(MAX_ENTRIES)),
            sinks,
        }
    }

    /// Logger that forwards every entry to `tracing`.
    pub fn tracing() -> Self {
        Self::with_sinks(vec![Box::new(TracingSink)])
    }

    // A poisoned lock only means another thread panicked mid-push; the
    // buffer itself is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an audit event.
    pub fn log(&self, event: AuditEvent, actor: &str, outcome: AuditOutcome, details: Option<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            actor: actor.into(),
            outcome,
            details,
        };

        {
            let mut entries = self.lock();
            if entries.len() >= MAX_ENTRIES {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        for sink in &self.sinks {
            sink.record(&entry);
        }
    }

    /// Get all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Get entries filtered by outcome.
    pub fn entries_by_outcome(&self, outcome: &AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| &e.outcome == outcome)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// A tracing-based audit sink that logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            event = ?entry.event,
            actor = %entry.actor,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn log_and_retrieve_entries() {
        let logger = AuditLogger::new();
        logger.log(AuditEvent::Registration, "alice", AuditOutcome::Success, None);
        logger.log(
            AuditEvent::LoginAttempt,
            "mallory",
            AuditOutcome::Failure,
            Some("invalid credentials".into()),
        );

        assert_eq!(logger.count(), 2);
        let entries = logger.entries();
        assert_eq!(entries[0].actor, "alice");
        assert_eq!(entries[1].actor, "mallory");
    }

    #[test]
    fn filter_by_outcome() {
        let logger = AuditLogger::new();
        logger.log(AuditEvent::LoginAttempt, "alice", AuditOutcome::Success, None);
        logger.log(AuditEvent::LoginAttempt, "bob", AuditOutcome::Failure, None);
        logger.log(AuditEvent::Logout, "alice", AuditOutcome::Success, None);

        assert_eq!(logger.entries_by_outcome(&AuditOutcome::Success).len(), 2);
        let failed = logger.entries_by_outcome(&AuditOutcome::Failure);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].actor, "bob");
    }

    #[test]
    fn oldest_entries_are_dropped_at_capacity() {
        let logger = AuditLogger::new();
        for i in 0..(MAX_ENTRIES + 5) {
            logger.log(AuditEvent::LoginAttempt, &format!("u{i}"), AuditOutcome::Success, None);
        }
        assert_eq!(logger.count(), MAX_ENTRIES);
        let entries = logger.entries();
        assert_eq!(entries[0].actor, "u5");
        assert_eq!(
            entries.last().map(|e| e.actor.as_str()),
            Some(format!("u{}", MAX_ENTRIES + 4).as_str())
        );

        // Keeps rotating in insertion order once full
        logger.log(AuditEvent::Logout, "late", AuditOutcome::Success, None);
        let entries = logger.entries();
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].actor, "u6");
        assert_eq!(entries[MAX_ENTRIES - 1].actor, "late");
    }

    #[test]
    fn clear_entries() {
        let logger = AuditLogger::default();
        logger.log(AuditEvent::Registration, "alice", AuditOutcome::Success, None);
        logger.clear();
        assert_eq!(logger.count(), 0);
    }

    #[test]
    fn event_serialization_is_tagged() {
        let json = serde_json::to_string(&AuditEvent::AuthFailure {
            reason: "rate limited".into(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"auth_failure""#));
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back,
            AuditEvent::AuthFailure {
                reason: "rate limited".into()
            }
        );
    }

    #[test]
    fn custom_sink_receives_events() {
        struct TestSink {
            received: Arc<Mutex<Vec<String>>>,
        }

        impl AuditSink for TestSink {
            fn record(&self, entry: &AuditEntry) {
                self.received.lock().unwrap().push(entry.actor.clone());
            }
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let logger = AuditLogger::with_sinks(vec![Box::new(TestSink {
            received: received.clone(),
        })]);
        logger.log(AuditEvent::Logout, "alice", AuditOutcome::Success, None);

        let got = received.lock().unwrap();
        assert_eq!(got.as_slice(), ["alice"]);
    }

    #[test]
    fn debug_format() {
        let logger = AuditLogger::tracing();
        let debug_str = format!("{logger:?}");
        assert!(debug_str.contains("entry_count"));
        assert!(debug_str.contains("sink_count: 1"));
    }
}

//! Sliding-window rate limiter for failed attempts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Simple in-memory sliding-window limiter.
///
/// Tracks failure timestamps per key (a normalized username for logins).
/// Callers ask [`is_limited`](Self::is_limited) before an attempt and call
/// [`record_failure`](Self::record_failure) only when it fails, so
/// successful attempts never count against the key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
#[derive(Debug)]
pub struct RateLimiter {
    max_failures: usize,
    window: Duration,
    clients: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_failures: usize, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// `true` once `key` has used up its failures for the current window.
    pub fn is_limited(&self, key: &str) -> bool {
        self.is_limited_at(key, Instant::now())
    }

    /// Count one failed attempt against `key`.
    pub fn record_failure(&self, key: &str) {
        self.record_failure_at(key, Instant::now());
    }

    /// Forget all failures for `key`.
    pub fn reset(&self, key: &str) {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.remove(key);
    }

    fn is_limited_at(&self, key: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        match clients.get_mut(key) {
            Some(timestamps) => {
                timestamps.retain(|t| now.duration_since(*t) < self.window);
                timestamps.len() >= self.max_failures
            }
            None => false,
        }
    }

    fn record_failure_at(&self, key: &str, now: Instant) {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict stale keys once the map gets large
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        timestamps.push(now);
    }
}

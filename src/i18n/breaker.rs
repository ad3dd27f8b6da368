//! Circuit breaker for the translation data store.
//!
//! After a hard failure the data store is skipped until a cooldown elapses,
//! so an unavailable database is not hit by every request's translation
//! lookup. Any later success closes the breaker immediately.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

pub struct CircuitBreaker {
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    blocked_until: Mutex<Option<DateTime<Utc>>>,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        Self {
            clock,
            cooldown,
            blocked_until: Mutex::new(None),
        }
    }

    /// Whether data-store access should be skipped right now.
    pub fn should_skip_db(&self) -> bool {
        match *self.blocked_until.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(until) => self.clock.now() < until,
            None => false,
        }
    }

    /// Open the breaker for one cooldown period starting now.
    pub fn mark_failure(&self) {
        let until = self.clock.now()
            + chrono::Duration::from_std(self.cooldown).unwrap_or(chrono::Duration::zero());
        *self.blocked_until.lock().unwrap_or_else(PoisonError::into_inner) = Some(until);
        warn!(
            "Translation data store marked unavailable until {}",
            until.to_rfc3339()
        );
    }

    /// Close the breaker.
    pub fn clear_failure(&self) {
        let previous = self
            .blocked_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!("Translation data store recovered, closing circuit breaker");
        }
    }

    pub fn blocked_until(&self) -> Option<DateTime<Utc>> {
        *self.blocked_until.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("cooldown", &self.cooldown)
            .field("blocked_until", &self.blocked_until())
            .finish()
    }
}

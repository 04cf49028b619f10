//! # Circuit Breakers
//!
//! Per-operation breaker state. `Closed` counts consecutive failures and
//! flips to `Open` at the threshold; an open breaker rejects calls until the
//! reset timeout has elapsed since the last failure, then closes again and
//! lets the next call through.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitStatus {
    Closed,
    Open,
}

#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerState {
    pub failures: u32,
    pub last_failure: Option<Instant>,
    pub is_open: bool,
}

impl CircuitBreakerState {
    pub fn status(&self) -> CircuitStatus {
        if self.is_open {
            CircuitStatus::Open
        } else {
            CircuitStatus::Closed
        }
    }

    /// Remaining time an open breaker keeps rejecting, `None` when a call may proceed
    fn remaining_open(&self, reset_timeout: Duration, now: Instant) -> Option<Duration> {
        if !self.is_open {
            return None;
        }
        let elapsed = self
            .last_failure
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(reset_timeout);
        (elapsed < reset_timeout).then(|| reset_timeout - elapsed)
    }
}

/// Outcome of recording a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Breaker stays closed
    Counted(u32),
    /// This failure tripped the breaker
    Opened(u32),
    /// Breaker was already open
    StillOpen(u32),
}

/// Process-wide map of breakers keyed by operation name
#[derive(Debug, Default)]
pub struct CircuitRegistry {
    breakers: Mutex<HashMap<String, CircuitBreakerState>>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CircuitBreakerState>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gate a call. Returns `Err(retry_in)` while the breaker is open; an open
    /// breaker whose timeout has elapsed is reset to closed.
    pub fn check(&self, operation: &str, reset_timeout: Duration) -> Result<(), Duration> {
        let now = Instant::now();
        let mut breakers = self.lock();
        let Some(state) = breakers.get_mut(operation) else {
            return Ok(());
        };

        if let Some(retry_in) = state.remaining_open(reset_timeout, now) {
            return Err(retry_in);
        }
        if state.is_open {
            *state = CircuitBreakerState::default();
        }
        Ok(())
    }

    pub fn record_success(&self, operation: &str) {
        if let Some(state) = self.lock().get_mut(operation) {
            *state = CircuitBreakerState::default();
        }
    }

    pub fn record_failure(&self, operation: &str, failure_threshold: u32) -> FailureOutcome {
        let mut breakers = self.lock();
        let state = breakers.entry(operation.to_string()).or_default();
        state.failures += 1;
        state.last_failure = Some(Instant::now());

        if state.is_open {
            FailureOutcome::StillOpen(state.failures)
        } else if state.failures >= failure_threshold.max(1) {
            state.is_open = true;
            FailureOutcome::Opened(state.failures)
        } else {
            FailureOutcome::Counted(state.failures)
        }
    }

    pub fn state(&self, operation: &str) -> Option<CircuitBreakerState> {
        self.lock().get(operation).cloned()
    }

    pub fn reset(&self, operation: &str) {
        self.lock().remove(operation);
    }
}

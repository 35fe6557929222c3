//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: testing if dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first call after the cooldown has elapsed
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency name (see registry.rs)
//! - Fail fast in Open state; the wrapped operation is never invoked
//! - Open → Half-Open is lazy: it happens on admission, not on a timer
//! - Bookkeeping runs under a std mutex that is never held across an await
//! - Without `exclusive_trial`, callers that arrive while a Half-Open trial is
//!   outstanding are admitted too and each runs its own trial. With it, the
//!   trial slot is claimed under the lock and late callers fail fast.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::BreakerError;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options fixed when a breaker is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerOptions {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// Time after the last failure before a trial call is admitted.
    pub cooldown: Duration,
    /// Admit a single Half-Open trial at a time.
    pub exclusive_trial: bool,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            exclusive_trial: false,
        }
    }
}

/// Read-only snapshot for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Inner {
    fn initial() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            trial_in_flight: false,
        }
    }
}

/// Circuit breaker guarding calls to one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    options: BreakerOptions,
    inner: Mutex<Inner>,
}

/// Releases the exclusive trial slot, also when the call future is dropped.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    held: bool,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, options: BreakerOptions) -> Self {
        Self {
            name: name.into(),
            options,
            inner: Mutex::new(Inner::initial()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> BreakerOptions {
        self.options
    }

    /// Stored state. An Open breaker past its cooldown still reports Open
    /// until the next call moves it to Half-Open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.lock();
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failure_count,
        }
    }

    /// Force the breaker closed regardless of cooldown.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        drop(inner);

        tracing::info!(dependency = %self.name, previous = %previous, "Circuit manually reset");
        metrics::record_breaker_state(&self.name, CircuitState::Closed);
    }

    /// Run `operation` if the breaker admits it.
    ///
    /// Returns [`BreakerError::Open`] without invoking the operation while the
    /// breaker is open, otherwise the operation's result with its error
    /// wrapped in [`BreakerError::Operation`].
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let slot = self.admit().map_err(|remaining| BreakerError::<E>::Open {
            name: self.name.clone(),
            remaining,
        })?;

        let result = operation().await;
        match result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        drop(slot);

        result.map_err(BreakerError::Operation)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admission check. `Err` carries the remaining cooldown.
    fn admit(&self) -> Result<TrialSlot<'_>, Duration> {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(TrialSlot { breaker: self, held: false }),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed <= self.options.cooldown {
                    drop(inner);
                    metrics::record_breaker_rejection(&self.name);
                    return Err(self.options.cooldown - elapsed);
                }

                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = self.options.exclusive_trial;
                drop(inner);

                tracing::info!(dependency = %self.name, "Cooldown elapsed, circuit half-open");
                metrics::record_breaker_state(&self.name, CircuitState::HalfOpen);
                Ok(TrialSlot { breaker: self, held: self.options.exclusive_trial })
            }
            CircuitState::HalfOpen => {
                if !self.options.exclusive_trial {
                    return Ok(TrialSlot { breaker: self, held: false });
                }
                if inner.trial_in_flight {
                    drop(inner);
                    metrics::record_breaker_rejection(&self.name);
                    return Err(Duration::ZERO);
                }
                // Previous trial was abandoned before it settled.
                inner.trial_in_flight = true;
                Ok(TrialSlot { breaker: self, held: true })
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        drop(inner);

        if previous != CircuitState::Closed {
            tracing::info!(dependency = %self.name, previous = %previous, "Circuit closed");
            metrics::record_breaker_state(&self.name, CircuitState::Closed);
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());

        let failures = inner.failure_count;
        let tripped = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => failures >= self.options.failure_threshold,
            CircuitState::Open => false,
        };
        let previous = inner.state;
        if tripped {
            inner.state = CircuitState::Open;
        }
        drop(inner);

        if tripped {
            tracing::warn!(
                dependency = %self.name,
                previous = %previous,
                failures,
                cooldown = ?self.options.cooldown,
                "Circuit opened"
            );
            metrics::record_breaker_state(&self.name, CircuitState::Open);
        } else {
            tracing::debug!(dependency = %self.name, failures, "Call failed");
        }
    }
}

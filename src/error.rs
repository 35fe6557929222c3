//! Error types shared across the substrate.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`CircuitBreaker::call`](crate::resilience::circuit_breaker::CircuitBreaker::call).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open and the wrapped operation was not invoked.
    #[error("circuit '{name}' is open, retry in {:.1}s", .remaining.as_secs_f64())]
    Open { name: String, remaining: Duration },

    /// The wrapped operation ran and failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// True if the call was rejected without running the operation.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Remaining cooldown for a rejected call.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            BreakerError::Open { remaining, .. } => Some(*remaining),
            BreakerError::Operation(_) => None,
        }
    }

    /// The operation's own error, if it ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

/// Failures of the temp-write + rename sequence.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The value could not be serialized to JSON.
    #[error("failed to serialize payload for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing or syncing the temporary file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Renaming the temporary file over the destination failed.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Outcome of a settled write cycle, as reported to waiters.
    #[error("write to {path} failed: {message}")]
    Write { path: PathBuf, message: String },
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

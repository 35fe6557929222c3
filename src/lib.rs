//! Resilience and persistence substrate for automation skills.
//!
//! Skills reach external providers through three narrow interfaces:
//! - run an operation through the breaker for a dependency
//!   ([`BreakerRegistry::get`] + [`CircuitBreaker::call`])
//! - retry an operation with exponential backoff ([`retry_async`], [`RetryPolicy`])
//! - atomically persist a value to a path ([`AtomicWriter::write`])
//!
//! [`Substrate`] bundles all three behind one handle built from
//! [`SubstrateConfig`].

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod resilience;
pub mod substrate;

pub use config::SubstrateConfig;
pub use error::{BreakerError, PersistenceError};
pub use persistence::{AtomicWriter, PersistenceOptions};
pub use resilience::{
    retry_async, BreakerOptions, BreakerRegistry, BreakerStatus, CircuitBreaker, CircuitState, RetryPolicy,
};
pub use substrate::Substrate;

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call from a skill:
//!     → registry.rs (look up the breaker for the dependency)
//!     → circuit_breaker.rs (fail fast if open, track failures)
//!     → retries.rs (retry the call with backoff.rs delays)
//!     → the call itself (enforces its own timeout)
//! ```
//!
//! # Design Decisions
//! - Breaker and retry are independent; callers choose how to nest them
//! - The breaker never retries internally
//! - Operation errors pass through both layers unchanged

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;
pub mod retries;

pub use circuit_breaker::{BreakerOptions, BreakerStatus, CircuitBreaker, CircuitState};
pub use registry::BreakerRegistry;
pub use retries::{retry_async, RetryPolicy};

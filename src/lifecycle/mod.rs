//! Lifecycle management for long-running commands.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → probe loop exits → breaker status printed → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

//! Atomic persistence subsystem.
//!
//! # Data Flow
//! ```text
//! skill mutates in-memory state
//!     → AtomicWriter::write(path, &state)      (returns immediately)
//!     → target.rs (in flight? park in pending slot : start a cycle)
//!     → atomic.rs flusher: temp file → fsync → rename over path
//!     → next pending payload, if any, else go idle
//! ```
//!
//! # Design Decisions
//! - Last submitted value wins within a busy window; intermediate values are
//!   superseded, not written
//! - A failed cycle is logged and never retried; the in-flight flag is
//!   cleared regardless so the path stays writable
//! - A crash before a parked payload is flushed loses that payload; callers
//!   needing durability use `write_durable`

use std::time::Duration;

pub mod atomic;
pub(crate) mod target;

pub use atomic::{write_atomically, AtomicWriter};

/// Knobs for the atomic writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceOptions {
    /// Wait before each cycle so more submissions coalesce.
    pub debounce: Duration,
    /// fsync the temp file before the rename.
    pub sync_data: bool,
    /// Create the destination's parent directories if missing.
    pub create_parent_dirs: bool,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::ZERO,
            sync_data: true,
            create_parent_dirs: true,
        }
    }
}

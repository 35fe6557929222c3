//! Per-path write state.
//!
//! # Invariants
//! - At most one write cycle per path is executing (`write_in_flight`)
//! - At most one payload waits behind it (`pending`); a newer submission
//!   replaces the waiting one
//! - Every submission gets a generation number. A cycle writing generation
//!   `g` settles every generation above the previous cycle's up to `g`; each
//!   waiter hears the outcome of the cycle covering its own generation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::observability::metrics;

/// A serialized value waiting to be written.
#[derive(Debug)]
pub(crate) struct Payload {
    pub generation: u64,
    pub bytes: Vec<u8>,
}

/// Outcome of a write cycle: `None` on success, the error message otherwise.
pub(crate) type Outcome = Option<String>;

/// How a caller learns the outcome covering its generation.
#[derive(Debug)]
pub(crate) enum Settlement {
    /// Already settled.
    Done(Outcome),
    /// Resolved when the covering cycle completes.
    Pending(oneshot::Receiver<Outcome>),
}

/// Result of handing a payload to a target.
#[derive(Debug)]
pub(crate) struct Submission {
    pub generation: u64,
    /// Set when no cycle was running; the caller must start one with it.
    pub start: Option<Payload>,
    /// Present when the submission asked to be told its outcome.
    pub settlement: Option<Settlement>,
}

#[derive(Debug)]
struct Waiter {
    generation: u64,
    tx: oneshot::Sender<Outcome>,
}

#[derive(Debug, Default)]
struct Slot {
    write_in_flight: bool,
    pending: Option<Payload>,
    last_generation: u64,
    /// Highest generation covered by a completed cycle.
    settled_through: u64,
    /// Outcome of the cycle that settled `settled_through`.
    last_outcome: Outcome,
    waiters: Vec<Waiter>,
}

impl Slot {
    fn settlement(&mut self, generation: u64) -> Settlement {
        if generation <= self.settled_through {
            // Only the latest generation can already be settled here, and the
            // cycle that wrote it is the one `last_outcome` describes.
            return Settlement::Done(self.last_outcome.clone());
        }
        let (tx, rx) = oneshot::channel();
        self.waiters.push(Waiter { generation, tx });
        Settlement::Pending(rx)
    }
}

/// Write bookkeeping for one destination file.
#[derive(Debug)]
pub(crate) struct PersistenceTarget {
    path: PathBuf,
    slot: Mutex<Slot>,
}

impl PersistenceTarget {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `bytes`. Starts a cycle if none is running, otherwise parks the
    /// payload in the pending slot. With `wait`, the submission also carries
    /// a settlement for its generation.
    pub fn submit(&self, bytes: Vec<u8>, wait: bool) -> Submission {
        let mut slot = self.lock();
        slot.last_generation += 1;
        let generation = slot.last_generation;
        let payload = Payload { generation, bytes };
        let settlement = wait.then(|| slot.settlement(generation));

        if !slot.write_in_flight {
            slot.write_in_flight = true;
            return Submission { generation, start: Some(payload), settlement };
        }

        let superseded = slot.pending.replace(payload);
        drop(slot);
        if let Some(superseded) = superseded {
            tracing::debug!(
                path = %self.path.display(),
                superseded = superseded.generation,
                generation,
                "Coalesced pending write"
            );
            metrics::record_persist_coalesced();
        }
        Submission { generation, start: None, settlement }
    }

    /// Settlement covering everything submitted so far, or `None` if nothing
    /// was ever submitted.
    pub fn settlement_for_latest(&self) -> Option<Settlement> {
        let mut slot = self.lock();
        match slot.last_generation {
            0 => None,
            latest => Some(slot.settlement(latest)),
        }
    }

    /// Swap `current` for a newer pending payload, if one arrived.
    pub fn supersede(&self, current: Payload) -> Payload {
        let newer = self.lock().pending.take();
        match newer {
            Some(newer) => {
                tracing::debug!(
                    path = %self.path.display(),
                    superseded = current.generation,
                    generation = newer.generation,
                    "Coalesced write during debounce"
                );
                metrics::record_persist_coalesced();
                newer
            }
            None => current,
        }
    }

    /// Record the outcome of the cycle that wrote `generation` and hand back
    /// the next payload.
    ///
    /// Waiters for generations up to `generation` hear `outcome`; later ones
    /// keep waiting. Returns `None` and clears the in-flight flag when nothing
    /// is pending, whether or not the cycle succeeded.
    pub fn complete(&self, generation: u64, outcome: Outcome) -> Option<Payload> {
        let mut slot = self.lock();
        slot.settled_through = generation;
        slot.last_outcome = outcome.clone();

        let (settled, waiting) = std::mem::take(&mut slot.waiters)
            .into_iter()
            .partition::<Vec<_>, _>(|w| w.generation <= generation);
        slot.waiters = waiting;

        let next = slot.pending.take();
        if next.is_none() {
            slot.write_in_flight = false;
        }
        drop(slot);

        for waiter in settled {
            // The waiter may have stopped listening.
            let _ = waiter.tx.send(outcome.clone());
        }
        next
    }

    pub fn is_idle(&self) -> bool {
        !self.lock().write_in_flight
    }
}

//! Shared helpers for integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A fake dependency whose calls are counted and whose health can be flipped.
#[derive(Clone, Default)]
pub struct FlakyDependency {
    calls: Arc<AtomicU32>,
    failures_left: Arc<AtomicU32>,
}

impl FlakyDependency {
    /// Fails the next `n` calls, then succeeds.
    pub fn failing(n: u32) -> Self {
        let dep = Self::default();
        dep.failures_left.store(n, Ordering::SeqCst);
        dep
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// One call taking `latency` of (virtual) time.
    pub async fn call(&self, latency: Duration) -> Result<u32, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(latency).await;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            Err(format!("call {} failed", n))
        } else {
            Ok(n)
        }
    }
}

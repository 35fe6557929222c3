//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Deterministic part of the delay before retry number `attempt` (0-based):
/// `base * 2^attempt`, saturating.
pub fn exponential_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor)
}

/// Uniform random jitter in `[0, max_jitter)`.
pub fn jitter(max_jitter: Duration) -> Duration {
    let max_ms = max_jitter.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max_jitter: Duration) -> Duration {
    exponential_delay(attempt, base).saturating_add(jitter(max_jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay_doubles() {
        let base = Duration::from_millis(1000);
        assert_eq!(exponential_delay(0, base), Duration::from_millis(1000));
        assert_eq!(exponential_delay(1, base), Duration::from_millis(2000));
        assert_eq!(exponential_delay(2, base), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        let jitter_cap = Duration::from_millis(500);
        for attempt in 0..4 {
            let d = calculate_backoff(attempt, base, jitter_cap);
            let floor = exponential_delay(attempt, base);
            assert!(d >= floor);
            assert!(d < floor + jitter_cap);
        }
    }

    #[test]
    fn test_no_jitter() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
        assert_eq!(calculate_backoff(3, Duration::from_millis(10), Duration::ZERO), Duration::from_millis(80));
    }

    #[test]
    fn test_large_attempt_saturates() {
        let d = exponential_delay(200, Duration::from_secs(1));
        assert!(d >= Duration::from_secs(u32::MAX as u64));
    }
}

//! Exponential backoff base (before jitter): `INITIAL_BACKOFF_MS * 2^(attempt-1)`.

use std::time::Duration;

pub fn exponential(attempt: u32, initial_backoff_ms: u64) -> Duration {
    let step = attempt.saturating_sub(1);
    let multiplier = 1u64 << step.min(20);
    Duration::from_millis(initial_backoff_ms.saturating_mul(multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_the_initial_backoff() {
        assert_eq!(exponential(1, 1000), Duration::from_millis(1000));
    }

    #[test]
    fn each_subsequent_attempt_doubles() {
        assert_eq!(exponential(2, 1000), Duration::from_millis(2000));
        assert_eq!(exponential(3, 1000), Duration::from_millis(4000));
    }
}

use std::time::Duration;

use crate::types::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_CEILING_MS,
};

/// Exponential backoff schedule for reconnection attempts.
///
/// Attempt `n` (0-indexed) waits `base × 2^n`, capped at the configured
/// ceiling. Once the attempt count reaches the configured maximum the
/// schedule is exhausted and [`next_delay`](Self::next_delay) yields `None`.
#[derive(Debug, Clone)]
pub struct BackoffTimer {
    attempts: u32,
    base: Duration,
    ceiling: Duration,
    max_attempts: u32,
}

impl BackoffTimer {
    pub fn new(base: Duration, ceiling: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            base,
            ceiling,
            max_attempts,
        }
    }

    /// Delay before the next attempt, or `None` when attempts are exhausted.
    /// Advances the attempt counter.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }

        let factor = 1u64.checked_shl(self.attempts).unwrap_or(u64::MAX);
        let delay_ms = (self.base.as_millis() as u64)
            .saturating_mul(factor)
            .min(self.ceiling.as_millis() as u64);

        self.attempts += 1;
        Some(Duration::from_millis(delay_ms))
    }

    /// Number of attempts consumed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the schedule. Called after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for BackoffTimer {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            Duration::from_millis(DEFAULT_RECONNECT_CEILING_MS),
            DEFAULT_MAX_RECONNECT_ATTEMPTS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_exhausted() {
        let mut timer = BackoffTimer::new(
            Duration::from_millis(1000),
            Duration::from_millis(60_000),
            3,
        );

        assert_eq!(timer.next_delay(), Some(Duration::from_millis(1000)));
        assert_eq!(timer.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(timer.next_delay(), Some(Duration::from_millis(4000)));
        assert_eq!(timer.next_delay(), None);
        assert_eq!(timer.next_delay(), None);
        assert_eq!(timer.attempts(), 3);
    }

    #[test]
    fn exact_doubling_for_first_five_attempts() {
        let mut timer = BackoffTimer::new(
            Duration::from_millis(500),
            Duration::from_millis(600_000),
            10,
        );

        for expected in [500u64, 1000, 2000, 4000, 8000] {
            assert_eq!(timer.next_delay(), Some(Duration::from_millis(expected)));
        }
    }

    #[test]
    fn ceiling_caps_the_delay() {
        let mut timer = BackoffTimer::new(
            Duration::from_millis(1000),
            Duration::from_millis(30_000),
            10,
        );

        // 1s, 2s, 4s, 8s, 16s, then 32s would exceed the 30s ceiling
        for _ in 0..5 {
            timer.next_delay();
        }
        assert_eq!(timer.next_delay(), Some(Duration::from_millis(30_000)));
        assert_eq!(timer.next_delay(), Some(Duration::from_millis(30_000)));
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut timer = BackoffTimer::new(
            Duration::from_millis(1000),
            Duration::from_millis(30_000),
            2,
        );

        timer.next_delay();
        timer.next_delay();
        assert_eq!(timer.next_delay(), None);

        timer.reset();
        assert_eq!(timer.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn large_attempt_counts_do_not_overflow() {
        let mut timer = BackoffTimer::new(
            Duration::from_millis(1000),
            Duration::from_millis(30_000),
            100,
        );

        let mut last = Duration::ZERO;
        for _ in 0..100 {
            last = timer.next_delay().expect("schedule not exhausted");
        }
        assert_eq!(last, Duration::from_millis(30_000));
    }
}

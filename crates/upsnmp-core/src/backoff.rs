use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    consecutive_failures: u32,
    next_allowed_at: Option<Instant>,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn next_allowed_at(&self) -> Option<Instant> {
        self.next_allowed_at
    }

    /// `base * 2^min(failures - 1, cap_exponent)`; the first failure waits one
    /// base interval.
    pub fn delay_for(base: Duration, failures: u32, cap_exponent: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (failures - 1).min(cap_exponent).min(31);
        base.saturating_mul(1_u32 << exponent)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_allowed_at
            .filter(|at| now < *at)
            .map(|at| at - now)
    }

    pub fn record_failure(&mut self, now: Instant, base: Duration, cap_exponent: u32) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = Self::delay_for(base, self.consecutive_failures, cap_exponent);
        self.next_allowed_at = Some(now + delay);
        delay
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.next_allowed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(10);

    #[test]
    fn delay_doubles_until_ceiling() {
        let delays: Vec<u64> = (1..=7)
            .map(|f| BackoffState::delay_for(BASE, f, 3).as_secs())
            .collect();
        assert_eq!(delays, vec![10, 20, 40, 80, 80, 80, 80]);
    }

    #[test]
    fn delay_is_monotonic_in_failures() {
        let mut previous = Duration::ZERO;
        for failures in 0..40 {
            let delay = BackoffState::delay_for(BASE, failures, 4);
            assert!(delay >= previous, "delay shrank at {failures} failures");
            previous = delay;
        }
        assert_eq!(previous, BASE * 16);
    }

    #[test]
    fn success_resets_streak_and_gate() {
        // Arrange
        let now = Instant::now();
        let mut backoff = BackoffState::new();
        backoff.record_failure(now, BASE, 3);
        backoff.record_failure(now, BASE, 3);

        // Act
        backoff.record_success();

        // Assert
        assert_eq!(backoff.consecutive_failures(), 0);
        assert_eq!(backoff.remaining(now), None);
        let next = backoff.record_failure(now, BASE, 3);
        assert_eq!(next, BASE, "first failure after success waits one base interval");
    }

    #[test]
    fn remaining_counts_down_to_none() {
        let now = Instant::now();
        let mut backoff = BackoffState::new();
        backoff.record_failure(now, BASE, 3);

        assert_eq!(backoff.remaining(now), Some(BASE));
        assert_eq!(backoff.remaining(now + Duration::from_secs(4)), Some(Duration::from_secs(6)));
        assert_eq!(backoff.remaining(now + BASE), None);
    }
}

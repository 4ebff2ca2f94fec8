//! Backoff schedule for waits between attempts.

use std::time::Duration;

/// Exponential backoff schedule: `base * 2^attempt`, no jitter.
///
/// Attempt numbering starts at 0 and restarts for each tier. The schedule
/// is pure and deterministic; the retry budget, not a delay cap, bounds
/// total wait time. Multiplication saturates instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    base: Duration,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
        }
    }
}

impl BackoffSchedule {
    /// Create a schedule with the given base unit.
    pub const fn new(base: Duration) -> Self {
        Self { base }
    }

    /// The base unit of the schedule.
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Delay to wait before retrying after the given 0-indexed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt() {
        let schedule = BackoffSchedule::new(Duration::from_secs(2));
        assert_eq!(schedule.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(schedule.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(schedule.delay_for_attempt(2), Duration::from_secs(8));
        assert_eq!(schedule.delay_for_attempt(6), Duration::from_secs(128));
    }

    #[test]
    fn matches_base_times_power_of_two() {
        let base = Duration::from_millis(250);
        let schedule = BackoffSchedule::new(base);
        for n in 0..12 {
            assert_eq!(schedule.delay_for_attempt(n), base * 2u32.pow(n));
        }
    }

    #[test]
    fn monotonically_increasing() {
        let schedule = BackoffSchedule::default();
        let mut previous = Duration::ZERO;
        for n in 0..20 {
            let delay = schedule.delay_for_attempt(n);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let schedule = BackoffSchedule::new(Duration::from_secs(1));
        // Shifts past the factor width must not panic.
        let huge = schedule.delay_for_attempt(40);
        assert!(huge >= schedule.delay_for_attempt(31));
    }
}

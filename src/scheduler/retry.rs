use std::time::Duration;

use crate::models;

/// Bounded exponential backoff for failed sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_backoff: Duration,
    max_backoff: Duration,
    max_consecutive_failures: u32,
}

impl RetryPolicy {
    pub fn new(
        initial_backoff: Duration,
        max_backoff: Duration,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    /// Delay before the next attempt, after `failures` consecutive failures
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map(|delay| delay.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }

    pub fn is_degraded(&self, failures: u32) -> bool {
        failures >= self.max_consecutive_failures
    }

    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }
}

impl From<&models::Scheduler> for RetryPolicy {
    fn from(config: &models::Scheduler) -> Self {
        Self::new(
            config.initial_backoff(),
            config.max_backoff(),
            config.max_consecutive_failures,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&models::Scheduler::default())
    }
}

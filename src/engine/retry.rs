use std::time::Duration;

use crate::utils::config::Timeouts;

/// Retry and wait budget handed to the resolver and executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Enablement polls before a click ladder runs anyway
    pub max_attempts: u32,
    /// Wait for one locator candidate
    pub per_attempt_timeout: Duration,
    /// Budget for a whole chain
    pub total_budget: Duration,
    /// Pause between polls
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            per_attempt_timeout: Duration::from_millis(6000),
            total_budget: Duration::from_millis(30000),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy for ordinary locator lookups
    pub fn from_timeouts(timeouts: &Timeouts) -> Self {
        Self {
            max_attempts: timeouts.enable_poll_attempts,
            per_attempt_timeout: Duration::from_millis(timeouts.locator_ms),
            total_budget: Duration::from_millis(timeouts.action_ms),
            poll_interval: Duration::from_millis(timeouts.poll_ms),
        }
    }

    /// Same policy with a different per-candidate wait
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    /// Same policy with a different chain budget
    pub fn with_total_budget(mut self, budget: Duration) -> Self {
        self.total_budget = budget;
        self
    }

    /// Budget that lets each of `specs` candidates wait its full timeout once
    pub fn spread_over(mut self, specs: usize) -> Self {
        self.total_budget = self.per_attempt_timeout * specs.max(1) as u32;
        self
    }

    pub fn per_attempt_ms(&self) -> u64 {
        self.per_attempt_timeout.as_millis() as u64
    }
}

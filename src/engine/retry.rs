//! Bounded retry accounting for transient fetch failures.

use std::time::Duration;

/// Default number of consecutive transient failures tolerated.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default backoff step; the n-th retry waits `n * step`.
pub const DEFAULT_RETRY_STEP: Duration = Duration::from_millis(1000);

/// Retry limits for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive transient failures retried before escalating.
    pub max_retries: u32,
    /// Linear backoff step.
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            step: DEFAULT_RETRY_STEP,
        }
    }
}

/// What to do after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then fetch again.
    Retry {
        /// 1-based retry number.
        attempt: u32,
        /// Backoff before the retry.
        delay: Duration,
    },
    /// The retry budget is spent; the loop must terminate.
    Escalate {
        /// Total consecutive failures, including this one.
        failures: u32,
    },
}

/// Consecutive-failure counter owned by one run of the polling loop.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    consecutive_failures: u32,
}

impl RetryState {
    /// Start with no recorded failures.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
        }
    }

    /// Failures recorded since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Reset the counter after a successful fetch.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a transient failure and decide whether to retry.
    pub fn record_failure(&mut self) -> RetryDecision {
        if self.consecutive_failures >= self.policy.max_retries {
            return RetryDecision::Escalate {
                failures: self.consecutive_failures.saturating_add(1),
            };
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        RetryDecision::Retry {
            attempt: self.consecutive_failures,
            delay: self.policy.step.saturating_mul(self.consecutive_failures),
        }
    }
}

// Accounting retry policy
//
// The scheduler's accounting subsystem may lag job completion, so a finished
// job can be missing from both the listing and the accounting report for a
// while. Queries are retried a bounded number of times.
use crate::application::constants::{ACCOUNTING_MAX_ATTEMPTS, ACCOUNTING_RETRY_DELAY};
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Query again after the delay
    Retry(Duration),
    /// Attempts exhausted, fall back to the default
    GiveUp,
}

/// Bounded, fixed-delay retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(ACCOUNTING_MAX_ATTEMPTS, ACCOUNTING_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Total attempts including the first (at least 1)
    /// * `delay` - Pause between consecutive attempts
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide what happens after `attempt` (1-based) came back empty
    ///
    /// There is no pause after the final attempt, so `max_attempts` queries
    /// are spaced by `max_attempts - 1` delays.
    pub fn after_failed_attempt(&self, job_id: &str, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            warn!(
                job_id = %job_id,
                attempts = %attempt,
                "Accounting query attempts exhausted"
            );
            return RetryDecision::GiveUp;
        }

        info!(
            job_id = %job_id,
            attempt = %attempt,
            max_attempts = %self.max_attempts,
            delay_ms = %self.delay.as_millis(),
            "Scheduling accounting retry"
        );
        RetryDecision::Retry(self.delay)
    }
}

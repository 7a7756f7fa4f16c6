use crate::process::AttemptStatus;
use std::{thread, time::Duration};
use tracing::{debug, warn};

pub const DEFAULT_ATTEMPTS: u32 = 10;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Bounded retry with a fixed backoff between failed attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    /// per-attempt timeout, `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    /// status of the last attempt
    pub status: AttemptStatus,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Call `attempt` until it succeeds or `max_attempts` is exhausted.
    /// `attempt` receives the 1-based attempt number.
    pub fn run<F>(&self, mut attempt: F) -> RetryOutcome
    where
        F: FnMut(u32) -> AttemptStatus,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let status = attempt(attempts);

            if status.success() {
                return RetryOutcome { status, attempts };
            }

            if attempts >= self.max_attempts.max(1) {
                warn!(attempts, status = %status, "Giving up after the last attempt failed");

                return RetryOutcome { status, attempts };
            }

            debug!(
                attempt = attempts,
                status = %status,
                "Attempt failed, retrying in {} ms",
                self.backoff.as_millis()
            );

            if !self.backoff.is_zero() {
                thread::sleep(self.backoff);
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;

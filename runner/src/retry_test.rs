use super::{RetryOutcome, RetryPolicy};
use crate::process::AttemptStatus;
use std::time::{Duration, Instant};

fn policy(max_attempts: u32, backoff_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::from_millis(backoff_ms),
        timeout: None,
    }
}

#[test]
pub fn default_matches_ten_attempts_one_second() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.max_attempts, 10);
    assert_eq!(policy.backoff, Duration::from_secs(1));
    assert_eq!(policy.timeout, None);
}

#[test]
pub fn first_success_stops() {
    let mut calls = 0;
    let outcome = policy(10, 0).run(|_| {
        calls += 1;
        AttemptStatus::Exited(0)
    });

    assert_eq!(calls, 1);
    assert_eq!(
        outcome,
        RetryOutcome {
            status: AttemptStatus::Exited(0),
            attempts: 1
        }
    );
}

#[test]
pub fn retries_until_success() {
    let outcome = policy(10, 0).run(|attempt| {
        if attempt < 4 {
            AttemptStatus::Exited(128)
        } else {
            AttemptStatus::Exited(0)
        }
    });

    assert_eq!(outcome.attempts, 4);
    assert!(outcome.status.success());
}

#[test]
pub fn exhausted_keeps_last_status() {
    let outcome = policy(3, 0).run(|attempt| AttemptStatus::Exited(attempt as i32));

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.status, AttemptStatus::Exited(3));
}

#[test]
pub fn zero_attempts_still_runs_once() {
    let outcome = policy(0, 0).run(|_| AttemptStatus::TimedOut);

    assert_eq!(outcome.attempts, 1);
}

#[test]
pub fn backoff_only_between_attempts() {
    let start = Instant::now();
    let outcome = policy(3, 50).run(|_| AttemptStatus::Exited(1));
    let elapsed = start.elapsed();

    assert_eq!(outcome.attempts, 3);
    // two sleeps, none after the final attempt
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(1000));
}

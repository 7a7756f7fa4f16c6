use super::Executor;
use crate::{job::TrainingJob, process::run_attempt, report::Completion, retry::RetryPolicy};
use tracing::{debug, instrument};

/// Executor that works on a local thread pool
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    threads: usize,
    policy: RetryPolicy,
}

impl LocalExecutor {
    /// create a new LocalExecutor instance
    pub fn load(threads: usize, policy: RetryPolicy) -> Self {
        Self {
            threads: threads.max(1),
            policy,
        }
    }
}

impl Executor for LocalExecutor {
    fn workers(&self) -> usize {
        self.threads
    }

    #[instrument(skip_all, level = "debug", fields(sample = %job.sample))]
    fn run_job(&self, job: &TrainingJob) -> Completion {
        let outcome = self.policy.run(|attempt| {
            debug!(attempt, "Running worker");

            run_attempt(&mut job.local_command(), self.policy.timeout)
        });

        Completion {
            sample: job.sample.clone(),
            status: outcome.status,
            attempts: outcome.attempts,
            host: None,
        }
    }
}

#[cfg(test)]
#[path = "local_test.rs"]
mod local_test;

use crate::process::AttemptStatus;
use std::fmt::{self, Display};
use tracing::{info, warn};

/// A sample that finished, successfully or after exhausting its attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub sample: String,
    pub status: AttemptStatus,
    pub attempts: u32,
    /// host of the last attempt, `None` for local execution
    pub host: Option<String>,
}

impl Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Finished {} with return code {} after {} attempts.",
            self.sample, self.status, self.attempts
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub attempts: u64,
}

impl Summary {
    pub fn record(&mut self, completion: &Completion) {
        self.attempts += u64::from(completion.attempts);

        if completion.status.success() {
            self.succeeded += 1;
        } else {
            self.failed.push(completion.sample.clone());
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn log(&self) {
        if self.success() {
            info!(
                samples = self.total(),
                attempts = self.attempts,
                "All samples finished successfully"
            );
        } else {
            warn!(
                samples = self.total(),
                attempts = self.attempts,
                failed = ?self.failed,
                "{} of {} samples failed",
                self.failed.len(),
                self.total()
            );
        }
    }
}

#[cfg(test)]
#[path = "report_test.rs"]
mod report_test;

use std::{
    fmt::{self, Display},
    os::unix::process::ExitStatusExt,
    process::{Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};
use tracing::{debug, trace, warn};
use wait_timeout::ChildExt;

/// Result of a single invocation of the training executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    /// process exited on its own with the given code
    Exited(i32),
    /// process was terminated by a signal
    Signaled(i32),
    /// process exceeded the per-attempt timeout and was killed
    TimedOut,
    /// process could not be started at all
    SpawnFailed(String),
}

impl AttemptStatus {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for AttemptStatus {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            // neither a code nor a signal is only possible for stopped children
            (None, None) => Self::Exited(-1),
        }
    }
}

impl Display for AttemptStatus {
    /// renders the return code the way a process runtime reports it,
    /// i.e., a negative number for signals
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "{code}"),
            Self::Signaled(signal) => write!(f, "-{signal}"),
            Self::TimedOut => write!(f, "timeout"),
            Self::SpawnFailed(_) => write!(f, "spawn error"),
        }
    }
}

/// Spawn `command` with discarded stdio and wait for it, killing it once `timeout` expires
pub fn run_attempt(command: &mut Command, timeout: Option<Duration>) -> AttemptStatus {
    let start = Instant::now();

    let mut child = match command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(error) => {
            warn!(error = ?error, program = ?command.get_program(), "Failed to spawn worker");

            return AttemptStatus::SpawnFailed(error.to_string());
        }
    };

    trace!(pid = child.id(), "Spawned worker");

    let waited = match timeout {
        Some(timeout) => child.wait_timeout(timeout),
        None => child.wait().map(Some),
    };

    let status = match waited {
        Ok(Some(status)) => AttemptStatus::from(status),
        Ok(None) => {
            // child hasn't exited yet
            if let Err(error) = child.kill() {
                warn!(error = ?error, pid = child.id(), "Failed to kill timed out worker");
            }
            // reap the killed child to avoid leaving a zombie behind
            let _ = child.wait();

            AttemptStatus::TimedOut
        }
        Err(error) => {
            warn!(error = ?error, pid = child.id(), "Failed to wait for worker");

            AttemptStatus::SpawnFailed(error.to_string())
        }
    };

    debug!(
        "Finished in {} ms | status: {status}",
        start.elapsed().as_millis()
    );

    status
}

#[cfg(test)]
#[path = "process_test.rs"]
mod process_test;

use super::{Executor, ExecutorError};
use crate::{
    hostfile::{slots, Host},
    job::TrainingJob,
    process::{run_attempt, AttemptStatus},
    report::Completion,
    retry::RetryPolicy,
};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::{collections::VecDeque, env, ops::Deref, path::PathBuf, process::Command};
use tracing::{debug, instrument, warn};

/// names under which the machine running the dispatcher is reachable without ssh
static LOCAL_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    let mut names = vec![
        String::from("localhost"),
        String::from("127.0.0.1"),
        String::from("::1"),
    ];

    match nix::unistd::gethostname() {
        Ok(hostname) => names.push(hostname.to_string_lossy().into_owned()),
        Err(error) => warn!(
            error = ?error,
            "Failed to retrieve hostname, only loopback names run locally"
        ),
    }

    names
});

pub fn is_local(host: &str) -> bool {
    LOCAL_NAMES.iter().any(|name| name == host)
}

/// Queue of free worker slots shared by all pool threads
#[derive(Debug, Default)]
pub struct SlotQueue {
    free: Mutex<VecDeque<String>>,
    available: Condvar,
}

/// A borrowed slot, returned to the back of the queue on drop
#[derive(Debug)]
pub struct SlotGuard<'a> {
    queue: &'a SlotQueue,
    host: String,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.queue
            .free
            .lock()
            .push_back(std::mem::take(&mut self.host));
        self.queue.available.notify_one();
    }
}

impl Deref for SlotGuard<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.host
    }
}

impl SlotQueue {
    pub fn new(slots: Vec<String>) -> Self {
        Self {
            free: Mutex::new(slots.into()),
            available: Condvar::new(),
        }
    }

    /// take the slot at the front, blocking until one is free
    pub fn acquire(&self) -> SlotGuard<'_> {
        let mut free = self.free.lock();

        loop {
            if let Some(host) = free.pop_front() {
                return SlotGuard { queue: self, host };
            }

            self.available.wait(&mut free);
        }
    }
}

/// Executor that runs every job on one of the slots listed in a hostfile.
/// Slots are handed out round robin and returned after each attempt, so a
/// retried job will usually run on a different host.
#[derive(Debug)]
pub struct HostExecutor {
    slots: SlotQueue,
    workers: usize,
    ssh: Vec<String>,
    workdir: PathBuf,
    policy: RetryPolicy,
}

impl HostExecutor {
    pub fn load(
        hosts: &[Host],
        ssh: Vec<String>,
        policy: RetryPolicy,
    ) -> Result<Self, ExecutorError> {
        let slots = slots(hosts);
        let workdir = env::current_dir().map_err(ExecutorError::WorkingDirectory)?;

        debug!(slots = ?slots, workdir = ?workdir, "Prepared host slots");

        Ok(Self {
            workers: slots.len().max(1),
            slots: SlotQueue::new(slots),
            ssh,
            workdir,
            policy,
        })
    }

    /// build the command that runs `job` on `host`
    pub fn command(&self, host: &str, job: &TrainingJob) -> Command {
        if is_local(host) {
            return job.local_command();
        }

        // killing the local ssh client leaves the remote worker running, it has to
        // enforce the timeout itself
        let limit = match self.policy.timeout {
            Some(timeout) => format!("timeout -s KILL {:.3} ", timeout.as_secs_f64()),
            None => String::new(),
        };

        // remote shells start in the home directory, relative paths are relative to ours
        let remote = format!(
            "cd {} && {limit}{}",
            shell_words::quote(&self.workdir.to_string_lossy()),
            job.command_line()
        );

        let (program, args) = match self.ssh.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => ("ssh", &[][..]),
        };

        let mut command = Command::new(program);
        command.args(args).arg(host).arg(remote);
        command
    }

    fn attempt(
        &self,
        job: &TrainingJob,
        attempt: u32,
        last_host: &mut Option<String>,
    ) -> AttemptStatus {
        let slot = self.slots.acquire();

        debug!(attempt, host = &*slot, "Running worker");

        let status = run_attempt(&mut self.command(&slot, job), self.policy.timeout);

        if !status.success() {
            warn!(host = &*slot, status = %status, attempt, "Worker failed");
        }

        *last_host = Some(slot.to_string());

        status
    }
}

impl Executor for HostExecutor {
    fn workers(&self) -> usize {
        self.workers
    }

    #[instrument(skip_all, level = "debug", fields(sample = %job.sample))]
    fn run_job(&self, job: &TrainingJob) -> Completion {
        let mut host = None;
        let outcome = self
            .policy
            .run(|attempt| self.attempt(job, attempt, &mut host));

        Completion {
            sample: job.sample.clone(),
            status: outcome.status,
            attempts: outcome.attempts,
            host,
        }
    }
}

#[cfg(test)]
#[path = "hosts_test.rs"]
mod hosts_test;

#[cfg(feature = "distributed")]
mod hosts;
mod local;

use crate::{
    config::{ConfigErrors, DispatchConfig, ExecutorConfig},
    job::TrainingJob,
    report::Completion,
    retry::RetryPolicy,
};
use rayon::ThreadPoolBuilder;
use std::{io, sync::mpsc};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[cfg(feature = "distributed")]
pub use hosts::HostExecutor;
pub use local::LocalExecutor;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to build thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to determine the working directory")]
    WorkingDirectory(#[source] io::Error),
}

/// Something that runs a single training job to completion, retries included
pub trait Executor: Sync {
    /// number of jobs that may run concurrently
    fn workers(&self) -> usize;

    fn run_job(&self, job: &TrainingJob) -> Completion;

    /// run all jobs on a dedicated thread pool, handing every completion to
    /// `on_complete` in the order the jobs finish
    fn execute<F>(&self, jobs: Vec<TrainingJob>, mut on_complete: F) -> Result<(), ExecutorError>
    where
        F: FnMut(Completion),
        Self: Sized,
    {
        let workers = self.workers();
        let total = jobs.len();

        debug!("Starting thread pool with {workers} threads");

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("dispatch-{index}"))
            .build()?;

        pool.in_place_scope(|scope| {
            let (sender, receiver) = mpsc::channel();

            for job in jobs.iter() {
                let sender = sender.clone();

                scope.spawn(move |_| {
                    // the receiver only goes away once every job reported back
                    let _ = sender.send(self.run_job(job));
                });
            }

            drop(sender);

            for (processed, completion) in receiver.into_iter().enumerate() {
                info!(
                    sample = %completion.sample,
                    host = completion.host.as_deref().unwrap_or("local"),
                    status = %completion.status,
                    "Done with {}/{total}",
                    processed + 1
                );

                on_complete(completion);
            }
        });

        info!("Done with processing");

        Ok(())
    }
}

/// All available executor variants, selected by `ExecutorConfig`
pub enum Executors {
    Local(LocalExecutor),
    #[cfg(feature = "distributed")]
    Hosts(HostExecutor),
}

impl Executors {
    pub fn load(config: &DispatchConfig) -> Result<Self, ConfigErrors> {
        let policy = RetryPolicy::from(&config.retry);

        match &config.executor {
            ExecutorConfig::Local { threads } => Ok(Self::Local(LocalExecutor::load(
                threads.unwrap_or_else(num_cpus::get),
                policy,
            ))),
            #[cfg(feature = "distributed")]
            ExecutorConfig::Hosts { hostfile, ssh } => {
                let hosts = crate::hostfile::load_hostfile(hostfile)?;

                Ok(Self::Hosts(HostExecutor::load(&hosts, ssh.clone(), policy)?))
            }
        }
    }

    #[instrument(skip_all, level = "info", fields(jobs = jobs.len()))]
    pub fn execute<F>(&self, jobs: Vec<TrainingJob>, on_complete: F) -> Result<(), ExecutorError>
    where
        F: FnMut(Completion),
    {
        match self {
            Self::Local(executor) => executor.execute(jobs, on_complete),
            #[cfg(feature = "distributed")]
            Self::Hosts(executor) => executor.execute(jobs, on_complete),
        }
    }
}

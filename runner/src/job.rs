use crate::config::TrainingConfig;
use itertools::Itertools;
use std::{
    ffi::{OsStr, OsString},
    process::Command,
};

/// Argument template for a single training sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingJob {
    pub sample: String,
    pub exec: OsString,
    pub args: Vec<OsString>,
}

/// concatenate without inserting a separator, directory prefixes carry their own trailing slash
fn join(prefix: &OsStr, sample: &str, suffix: &str) -> OsString {
    let mut joined = OsString::with_capacity(prefix.len() + sample.len() + suffix.len());
    joined.push(prefix);
    joined.push(sample);
    joined.push(suffix);
    joined
}

impl TrainingJob {
    pub fn new(config: &TrainingConfig, sample: &str) -> Self {
        let args = vec![
            OsString::from("-i"),
            join(config.images.as_os_str(), sample, ".jpg"),
            OsString::from("-g"),
            join(config.ground_truth.as_os_str(), sample, ".png"),
            OsString::from("-u"),
            join(config.unaries.as_os_str(), sample, "_prob.dat"),
            OsString::from("-o"),
            config.out.clone().into_os_string(),
            OsString::from("-w"),
            config.weights.clone().into_os_string(),
            OsString::from("-fw"),
            config.feature_weights.clone().into_os_string(),
            OsString::from("-c"),
            OsString::from(config.clusters.to_string()),
        ];

        Self {
            sample: sample.to_owned(),
            exec: config.exec.clone().into_os_string(),
            args,
        }
    }

    /// command for running the job on this machine
    pub fn local_command(&self) -> Command {
        let mut command = Command::new(&self.exec);
        command.args(&self.args);
        command
    }

    /// the job as a single, shell quoted command line
    pub fn command_line(&self) -> String {
        shell_words::join(
            std::iter::once(&self.exec)
                .chain(self.args.iter())
                .map(|arg| arg.to_string_lossy())
                .collect_vec(),
        )
    }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod job_test;

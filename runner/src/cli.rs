use crate::config::{ConfigErrors, DispatchConfig, ExecutorConfig};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::warn;

/// Distribute segmentation training samples over local workers or cluster hosts
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Training executable invoked once per sample
    #[arg(short, long)]
    pub exec: Option<PathBuf>,

    /// Image directory prefix, `<images><sample>.jpg`
    #[arg(short, long)]
    pub images: Option<PathBuf>,

    /// Ground truth directory prefix, `<ground-truth><sample>.png`
    #[arg(short, long)]
    pub ground_truth: Option<PathBuf>,

    /// Unary directory prefix, `<unaries><sample>_prob.dat`
    #[arg(short, long)]
    pub unaries: Option<PathBuf>,

    /// Output directory handed to every worker
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Weights file
    #[arg(short, long)]
    pub weights: Option<PathBuf>,

    /// Feature weights file
    #[arg(short, long)]
    pub feature_weights: Option<PathBuf>,

    /// Number of clusters
    #[arg(short = 'n', long)]
    pub clusters: Option<u32>,

    /// File listing one training sample per line
    #[arg(short, long)]
    pub training: Option<PathBuf>,

    /// YAML config file, command line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hostfile with `host [slots]` lines, runs workers over ssh
    #[arg(long)]
    pub hostfile: Option<PathBuf>,

    /// Number of local workers, defaults to the number of CPUs
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Maximum number of attempts per sample
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Pause between attempts in milliseconds
    #[arg(long)]
    pub backoff: Option<u64>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seed for shuffling the training list
    #[arg(long)]
    pub seed: Option<u64>,

    /// Create the labeling/, sp/ and sp_gt/ result directories before dispatching
    #[arg(long)]
    pub create_output_dirs: bool,

    /// Print the worker commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity
    #[arg(short, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// override config values with the ones given on the command line
    pub fn apply(&self, config: &mut DispatchConfig) -> Result<(), ConfigErrors> {
        let training = &mut config.training;

        for (target, value) in [
            (&mut training.exec, &self.exec),
            (&mut training.images, &self.images),
            (&mut training.ground_truth, &self.ground_truth),
            (&mut training.unaries, &self.unaries),
            (&mut training.out, &self.out),
            (&mut training.weights, &self.weights),
            (&mut training.feature_weights, &self.feature_weights),
            (&mut training.training, &self.training),
        ] {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        if let Some(clusters) = self.clusters {
            training.clusters = clusters;
        }

        if let Some(attempts) = self.attempts {
            config.retry.attempts = attempts;
        }
        if let Some(backoff) = self.backoff {
            config.retry.backoff_ms = backoff;
        }
        if let Some(timeout) = self.timeout {
            config.retry.timeout_secs = Some(timeout);
        }

        if let Some(hostfile) = &self.hostfile {
            self.apply_hostfile(config, hostfile.clone())?;
        }

        if let Some(count) = self.threads {
            match &mut config.executor {
                ExecutorConfig::Local { threads } => *threads = Some(count),
                #[cfg(feature = "distributed")]
                ExecutorConfig::Hosts { .. } => {
                    warn!("--threads is ignored, the hostfile defines the number of workers")
                }
            }
        }

        Ok(())
    }

    #[cfg(feature = "distributed")]
    fn apply_hostfile(
        &self,
        config: &mut DispatchConfig,
        path: PathBuf,
    ) -> Result<(), ConfigErrors> {
        config.executor = match std::mem::take(&mut config.executor) {
            ExecutorConfig::Hosts { ssh, .. } => ExecutorConfig::Hosts {
                hostfile: path,
                ssh,
            },
            ExecutorConfig::Local { .. } => ExecutorConfig::Hosts {
                hostfile: path,
                ssh: crate::config::default_ssh(),
            },
        };

        Ok(())
    }

    #[cfg(not(feature = "distributed"))]
    fn apply_hostfile(
        &self,
        _config: &mut DispatchConfig,
        _path: PathBuf,
    ) -> Result<(), ConfigErrors> {
        Err(ConfigErrors::UnsupportedExecutor(String::from("hosts")))
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod cli_test;

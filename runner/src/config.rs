use crate::{
    executors::ExecutorError,
    hostfile::HostfileError,
    retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_MS},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, error, warn};

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to open config file {0}")]
    OpenConfig(PathBuf, #[source] Error),
    #[error("Failed to parse config file")]
    ParseConfig(#[from] serde_yaml::Error),
    #[cfg(not(feature = "distributed"))]
    #[error("Executor not supported: {0}")]
    UnsupportedExecutor(String),
    #[error("Executor failed to load")]
    FailedLoadExecutor(#[from] ExecutorError),
    #[error("Failed to load hostfile")]
    Hostfile(#[from] HostfileError),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("Configuration contains {0} error(s)")]
    Preflight(usize),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    // executor config, local thread pool or a set of ssh reachable hosts
    #[serde(default)]
    pub executor: ExecutorConfig,
    // inputs for the argument template of the training executable
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "name", rename_all = "lowercase", deny_unknown_fields)]
pub enum ExecutorConfig {
    Local {
        // defaults to the number of CPUs
        #[serde(default)]
        threads: Option<usize>,
    },
    #[cfg(feature = "distributed")]
    Hosts {
        hostfile: PathBuf,
        // command prefix used to reach a remote host, the host name is appended
        #[serde(default = "default_ssh")]
        ssh: Vec<String>,
    },
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::Local { threads: None }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    #[serde(default = "default_exec")]
    pub exec: PathBuf,
    // directory prefixes, the sample name is appended verbatim
    #[serde(default, alias = "img")]
    pub images: PathBuf,
    #[serde(default, alias = "gt")]
    pub ground_truth: PathBuf,
    #[serde(default, alias = "un")]
    pub unaries: PathBuf,
    #[serde(default)]
    pub out: PathBuf,
    #[serde(default)]
    pub weights: PathBuf,
    #[serde(default)]
    pub feature_weights: PathBuf,
    #[serde(default = "default_clusters")]
    pub clusters: u32,
    // file listing one sample per line
    #[serde(default = "default_training")]
    pub training: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            exec: default_exec(),
            images: PathBuf::new(),
            ground_truth: PathBuf::new(),
            unaries: PathBuf::new(),
            out: PathBuf::new(),
            weights: PathBuf::new(),
            feature_weights: PathBuf::new(),
            clusters: default_clusters(),
            training: default_training(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            timeout_secs: None,
        }
    }
}

impl TrainingConfig {
    /// create the result directories the training executable writes into
    pub fn create_output_dirs(&self) -> Result<(), Error> {
        for directory in ["labeling", "sp", "sp_gt"] {
            let path = self.out.join(directory);
            fs::create_dir_all(&path)?;

            debug!(path = ?path, "Created output directory");
        }

        Ok(())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.attempts,
            backoff: Duration::from_millis(config.backoff_ms),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl DispatchConfig {
    /// load the config file if one was given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigErrors> {
        match path {
            Some(path) => {
                let file =
                    File::open(path).map_err(|e| ConfigErrors::OpenConfig(path.to_path_buf(), e))?;
                let config: Self = serde_yaml::from_reader(file)?;

                debug!(path = ?path, "Loaded config file");

                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Validate the config, logging every problem before failing
    pub fn preflight_checks(&self) -> Result<(), ConfigErrors> {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut errors = 0;
        let training = &self.training;

        for (name, value) in [
            ("images", &training.images),
            ("ground_truth", &training.ground_truth),
            ("unaries", &training.unaries),
            ("out", &training.out),
            ("weights", &training.weights),
            ("feature_weights", &training.feature_weights),
        ] {
            if value.as_os_str().is_empty() {
                error!("training.{name} must be set, either in the config file or on the command line");
                errors += 1;
            }
        }

        for (name, value) in [
            ("weights", &training.weights),
            ("feature_weights", &training.feature_weights),
        ] {
            if !value.as_os_str().is_empty() && !value.is_file() {
                warn!(
                    "training.{name} ({}) was not found on this machine",
                    value.to_string_lossy()
                );
            }
        }

        if training.clusters == 0 {
            error!("training.clusters cannot be 0");
            errors += 1;
        }

        match &self.executor {
            ExecutorConfig::Local { threads } => {
                if *threads == Some(0) {
                    error!("executor.threads cannot be 0");
                    errors += 1;
                }

                match check_executable(&training.exec) {
                    Ok(true) => {}
                    Ok(false) => {
                        error!(
                            "training.exec ({}) is not executable",
                            training.exec.to_string_lossy()
                        );
                        errors += 1;
                    }
                    Err(e) => {
                        error!(
                            "Failed to determine if training.exec ({}) is an executable: {e}",
                            training.exec.to_string_lossy()
                        );
                        errors += 1;
                    }
                }
            }
            #[cfg(feature = "distributed")]
            ExecutorConfig::Hosts { ssh, .. } => {
                if ssh.is_empty() {
                    error!("executor.ssh cannot be empty");
                    errors += 1;
                }

                // the executable only has to exist on the worker hosts
                if !training.exec.is_file() {
                    warn!(
                        "training.exec ({}) was not found on this machine, assuming it exists on all hosts",
                        training.exec.to_string_lossy()
                    );
                }
            }
        }

        if self.retry.attempts == 0 {
            error!("retry.attempts cannot be 0");
            errors += 1;
        }

        if self.retry.timeout_secs == Some(0) {
            error!("retry.timeout_secs cannot be 0, leave it unset to disable the timeout");
            errors += 1;
        }

        if errors == 0 {
            Ok(())
        } else {
            Err(ConfigErrors::Preflight(errors))
        }
    }
}

fn default_exec() -> PathBuf {
    PathBuf::from("./hseg_train_dist_pred")
}

fn default_training() -> PathBuf {
    PathBuf::from("train.txt")
}

fn default_clusters() -> u32 {
    400
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

#[cfg(feature = "distributed")]
pub fn default_ssh() -> Vec<String> {
    ["ssh", "-o", "BatchMode=yes"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

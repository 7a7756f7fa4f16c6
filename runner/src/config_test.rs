use super::{check_executable, ConfigErrors, DispatchConfig, ExecutorConfig, TrainingConfig};
use crate::retry::RetryPolicy;
use std::{
    fs::{self, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

fn write_script(dir: &Path, name: &str, mode: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&path, Permissions::from_mode(mode)).unwrap();
    path
}

fn complete_training(exec: PathBuf) -> TrainingConfig {
    TrainingConfig {
        exec,
        images: PathBuf::from("/data/color/"),
        ground_truth: PathBuf::from("/data/gt/"),
        unaries: PathBuf::from("/data/unaries/"),
        out: PathBuf::from("/results/"),
        weights: PathBuf::from("/results/weights.dat"),
        feature_weights: PathBuf::from("/results/featureWeights.txt"),
        ..TrainingConfig::default()
    }
}

#[test]
pub fn defaults_without_file() {
    let config = DispatchConfig::load(None).unwrap();

    assert_eq!(config.executor, ExecutorConfig::Local { threads: None });
    assert_eq!(config.training.exec, PathBuf::from("./hseg_train_dist_pred"));
    assert_eq!(config.training.clusters, 400);
    assert_eq!(config.training.training, PathBuf::from("train.txt"));
    assert_eq!(RetryPolicy::from(&config.retry), RetryPolicy::default());
}

#[cfg(feature = "distributed")]
#[test]
pub fn parses_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "
executor:
  name: hosts
  hostfile: /etc/cluster/hosts
training:
  exec: /opt/hseg/hseg_train_dist_pred
  img: /work/color/
  gt: /work/gt/
  unaries: /work/unaries/
  out: /work/results/
  weights: /work/results/weights.dat
  feature_weights: /work/results/featureWeights.txt
  clusters: 200
retry:
  attempts: 3
  backoff_ms: 250
  timeout_secs: 600
"
    )
    .unwrap();

    let config = DispatchConfig::load(Some(file.path())).unwrap();

    assert_eq!(
        config.executor,
        ExecutorConfig::Hosts {
            hostfile: PathBuf::from("/etc/cluster/hosts"),
            ssh: super::default_ssh(),
        }
    );
    assert_eq!(config.training.images, PathBuf::from("/work/color/"));
    assert_eq!(config.training.ground_truth, PathBuf::from("/work/gt/"));
    assert_eq!(config.training.clusters, 200);
    assert_eq!(config.training.training, PathBuf::from("train.txt"));
    assert_eq!(
        RetryPolicy::from(&config.retry),
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
            timeout: Some(Duration::from_secs(600)),
        }
    );
}

#[test]
pub fn unknown_fields_are_rejected() {
    for content in [
        "training:\n  clusterz: 3\n",
        "executor:\n  name: local\n  thread: 4\n",
        "executor:\n  name: slurm\n",
    ] {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();

        assert!(
            matches!(
                DispatchConfig::load(Some(file.path())),
                Err(ConfigErrors::ParseConfig(_))
            ),
            "accepted {content:?}"
        );
    }
}

#[test]
pub fn local_executor_threads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "executor:\n  name: local\n  threads: 4\n").unwrap();

    assert_eq!(
        DispatchConfig::load(Some(file.path())).unwrap().executor,
        ExecutorConfig::Local { threads: Some(4) }
    );
}

#[test]
pub fn executable_bit_is_detected() {
    let dir = tempfile::tempdir().unwrap();

    assert!(check_executable(&write_script(dir.path(), "exec", 0o755)).unwrap());
    assert!(!check_executable(&write_script(dir.path(), "plain", 0o644)).unwrap());
    assert!(matches!(
        check_executable(&dir.path().join("missing")),
        Err(ConfigErrors::FileNotFound(_))
    ));
}

#[test]
pub fn preflight_accepts_complete_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatchConfig {
        training: complete_training(write_script(dir.path(), "train", 0o755)),
        ..DispatchConfig::default()
    };

    assert!(config.preflight_checks().is_ok());
}

#[test]
pub fn preflight_counts_every_problem() {
    let mut config = DispatchConfig::default();
    config.training.exec = PathBuf::from("/nonexistent/train");
    config.training.clusters = 0;
    config.retry.attempts = 0;
    config.retry.timeout_secs = Some(0);
    config.executor = ExecutorConfig::Local { threads: Some(0) };

    // six missing paths, clusters, threads, exec, attempts, timeout
    assert!(matches!(
        config.preflight_checks(),
        Err(ConfigErrors::Preflight(11))
    ));
}

#[cfg(feature = "distributed")]
#[test]
pub fn preflight_hosts_tolerates_remote_only_exec() {
    let config = DispatchConfig {
        executor: ExecutorConfig::Hosts {
            hostfile: PathBuf::from("hosts"),
            ssh: super::default_ssh(),
        },
        training: complete_training(PathBuf::from("/only/on/nodes/train")),
        ..DispatchConfig::default()
    };

    assert!(config.preflight_checks().is_ok());
}

#[test]
pub fn creates_result_directories() {
    let dir = tempfile::tempdir().unwrap();
    let training = TrainingConfig {
        out: dir.path().join("results"),
        ..TrainingConfig::default()
    };

    training.create_output_dirs().unwrap();
    // existing directories are fine
    training.create_output_dirs().unwrap();

    for name in ["labeling", "sp", "sp_gt"] {
        assert!(dir.path().join("results").join(name).is_dir());
    }
}

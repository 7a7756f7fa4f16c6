use crate::config::TrainingConfig;
use std::{
    fs::{self, Permissions},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Write a fake training executable into `dir`.
///
/// The sample name is taken from the image argument. Every call increments
/// `<dir>/<sample>.count`; `flaky` succeeds from the third attempt on,
/// `broken` always exits with 7, `slow` touches `<dir>/slow.survived` after a
/// second and everything else succeeds at once.
pub fn fake_trainer(dir: &Path) -> PathBuf {
    let path = dir.join("hseg_train_dist_pred");
    let script = format!(
        r#"#!/bin/sh
name=$(basename "$2" .jpg)
count_file="{dir}/$name.count"
n=$(cat "$count_file" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$count_file"
case "$name" in
    flaky) [ "$n" -ge 3 ] && exit 0 || exit 1 ;;
    broken) exit 7 ;;
    slow) sleep 1; touch "{dir}/$name.survived" ;;
    *) exit 0 ;;
esac
"#,
        dir = dir.display()
    );

    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, Permissions::from_mode(0o755)).unwrap();

    path
}

pub fn attempts_made(dir: &Path, sample: &str) -> u32 {
    fs::read_to_string(dir.join(format!("{sample}.count")))
        .map(|count| count.trim().parse().unwrap())
        .unwrap_or(0)
}

pub fn training_config(dir: &Path) -> TrainingConfig {
    let prefix = |name: &str| PathBuf::from(format!("{}/{name}/", dir.display()));

    TrainingConfig {
        exec: fake_trainer(dir),
        images: PathBuf::from(format!("{}/", dir.display())),
        ground_truth: prefix("gt"),
        unaries: prefix("unaries"),
        out: prefix("results"),
        weights: dir.join("weights.dat"),
        feature_weights: dir.join("featureWeights.txt"),
        clusters: 400,
        training: dir.join("train.txt"),
    }
}

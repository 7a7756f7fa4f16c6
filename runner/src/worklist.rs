use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{fs, io, path::Path};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum WorklistError {
    #[error("Failed to read training list {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("Training list {0} contains no samples")]
    Empty(String),
}

/// Read one sample identifier per line, skipping blank lines
pub fn read_worklist(path: &Path) -> Result<Vec<String>, WorklistError> {
    let content = fs::read_to_string(path).map_err(|source| WorklistError::Read {
        path: path.to_string_lossy().into_owned(),
        source,
    })?;

    let samples = parse_worklist(&content);

    if samples.is_empty() {
        return Err(WorklistError::Empty(path.to_string_lossy().into_owned()));
    }

    debug!(path = ?path, samples = samples.len(), "Loaded training list");

    Ok(samples)
}

pub fn parse_worklist(content: &str) -> Vec<String> {
    content
        .lines()
        .enumerate()
        .filter_map(|(number, line)| {
            let line = line.trim_end_matches('\r');

            if line.trim().is_empty() {
                warn!(line = number + 1, "Skipping blank line in training list");
                None
            } else {
                Some(line.to_owned())
            }
        })
        .collect()
}

/// Shuffle the work list in place so a failing host is unlikely to see the
/// same sample twice in a row. A seed makes the order reproducible.
pub fn shuffle(samples: &mut [String], seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    samples.shuffle(&mut rng);
}

#[cfg(test)]
#[path = "worklist_test.rs"]
mod worklist_test;

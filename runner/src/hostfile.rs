use itertools::Itertools;
use std::{fs, io, path::Path};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum HostfileError {
    #[error("Failed to read hostfile {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("Invalid host '{value}' on line {line}")]
    InvalidHost { line: usize, value: String },
    #[error("Invalid slot count '{value}' on line {line}")]
    InvalidSlots { line: usize, value: String },
    #[error("Unexpected trailing value '{value}' on line {line}")]
    TrailingValue { line: usize, value: String },
    #[error("Hostfile doesn't provide a single worker slot")]
    NoSlots,
}

/// A host and the number of workers it may run concurrently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub slots: usize,
}

pub fn load_hostfile(path: &Path) -> Result<Vec<Host>, HostfileError> {
    let content = fs::read_to_string(path).map_err(|source| HostfileError::Read {
        path: path.to_string_lossy().into_owned(),
        source,
    })?;

    let hosts = parse_hostfile(&content)?;

    info!(
        hosts = hosts.len(),
        slots = hosts.iter().map(|host| host.slots).sum::<usize>(),
        "Loaded hostfile"
    );

    Ok(hosts)
}

/// Parse `host [slots]` lines, the slot count may also be written as
/// `host slots=N` or `host=N`. Hosts listed several times are merged and
/// hosts with zero slots are dropped.
pub fn parse_hostfile(content: &str) -> Result<Vec<Host>, HostfileError> {
    let mut hosts: Vec<Host> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let number = index + 1;
        let line = line.split('#').next().unwrap_or("").trim();
        let mut fields = line.split_whitespace();

        let Some(first) = fields.next() else {
            continue;
        };

        let (name, inline) = match first.split_once('=') {
            Some((name, count)) => (name, Some(count)),
            None => (first, None),
        };

        if name.is_empty() {
            return Err(HostfileError::InvalidHost {
                line: number,
                value: first.to_owned(),
            });
        }

        let parse_slots = |value: &str, field: &str| {
            value
                .parse::<usize>()
                .map_err(|_| HostfileError::InvalidSlots {
                    line: number,
                    value: field.to_owned(),
                })
        };

        let slots = match (inline, fields.next()) {
            (None, None) => 1,
            (None, Some(field)) => {
                parse_slots(field.strip_prefix("slots=").unwrap_or(field), field)?
            }
            (Some(count), None) => parse_slots(count, first)?,
            (Some(_), Some(field)) => {
                return Err(HostfileError::TrailingValue {
                    line: number,
                    value: field.to_owned(),
                })
            }
        };

        if let Some(value) = fields.next() {
            return Err(HostfileError::TrailingValue {
                line: number,
                value: value.to_owned(),
            });
        }

        if slots == 0 {
            debug!(host = name, "Skipping host without slots");
            continue;
        }

        match hosts.iter_mut().find(|host| host.name == name) {
            Some(host) => host.slots += slots,
            None => hosts.push(Host {
                name: name.to_owned(),
                slots,
            }),
        }
    }

    if hosts.is_empty() {
        Err(HostfileError::NoSlots)
    } else {
        Ok(hosts)
    }
}

/// Expand hosts into individual slots, interleaved so that consecutive slots
/// land on different hosts whenever possible
pub fn slots(hosts: &[Host]) -> Vec<String> {
    let max = hosts.iter().map(|host| host.slots).max().unwrap_or(0);

    (0..max)
        .flat_map(|round| {
            hosts
                .iter()
                .filter(move |host| host.slots > round)
                .map(|host| host.name.clone())
        })
        .collect_vec()
}

#[cfg(test)]
#[path = "hostfile_test.rs"]
mod hostfile_test;

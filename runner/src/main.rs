mod cli;
mod config;
mod executors;
mod hostfile;
mod job;
mod process;
mod report;
mod retry;
#[cfg(test)]
mod test_util;
mod worklist;

use clap::Parser;
use cli::Args;
use config::{ConfigErrors, DispatchConfig};
use executors::{ExecutorError, Executors};
use itertools::Itertools;
use job::TrainingJob;
use report::Summary;
use std::{
    io::{self, Write},
    process::ExitCode,
};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use worklist::WorklistError;

#[derive(Error, Debug)]
enum DispatchError {
    #[error("Invalid configuration")]
    Config(#[from] ConfigErrors),
    #[error("Failed to load the training list")]
    Worklist(#[from] WorklistError),
    #[error("Failed to create output directories")]
    OutputDirectories(#[source] io::Error),
    #[error("Failed to execute jobs")]
    Executor(#[from] ExecutorError),
    #[error("Failed to write output")]
    Output(#[source] io::Error),
}

/// log to stderr, RUST_LOG takes precedence over the verbosity flag
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// run the dispatch, completion lines (or commands for a dry run) go to `out`
fn run<W: Write>(args: Args, out: &mut W) -> Result<Summary, DispatchError> {
    let mut config = DispatchConfig::load(args.config.as_deref())?;
    args.apply(&mut config)?;
    config.preflight_checks()?;

    if args.create_output_dirs {
        config
            .training
            .create_output_dirs()
            .map_err(DispatchError::OutputDirectories)?;
    }

    let mut samples = worklist::read_worklist(&config.training.training)?;
    worklist::shuffle(&mut samples, args.seed);

    let jobs = samples
        .iter()
        .map(|sample| TrainingJob::new(&config.training, sample))
        .collect_vec();

    let mut summary = Summary::default();

    if args.dry_run {
        for job in jobs.iter() {
            writeln!(out, "{}", job.command_line()).map_err(DispatchError::Output)?;
        }

        return Ok(summary);
    }

    let executor = Executors::load(&config)?;

    info!(samples = jobs.len(), "Dispatching training samples");

    executor.execute(jobs, |completion| {
        if let Err(error) = writeln!(out, "{completion}") {
            warn!(error = ?error, sample = %completion.sample, "Failed to report completion");
        }
        summary.record(&completion);
    })?;

    summary.log();

    Ok(summary)
}

/// 0 when every sample succeeded, 1 when a sample ran out of attempts, 2 when
/// the dispatch couldn't start
fn exit_status(result: &Result<Summary, DispatchError>) -> u8 {
    match result {
        Ok(summary) if summary.success() => 0,
        Ok(_) => 1,
        Err(_) => 2,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = run(args, &mut io::stdout().lock());

    if let Err(error) = &result {
        error!(error = ?error, "{error}");
    }

    ExitCode::from(exit_status(&result))
}

pub mod config;
pub mod pipeline;

pub use config::{ConfigError, IntakeConfig, Resolution};
pub use pipeline::batch::{
    expand_directory, run_batch, BatchNotice, BatchResult, BatchRunner, BatchSummary, FileReport,
    ReportStatus,
};
pub use pipeline::error::{FileError, InvalidReason, PipelineError};

use std::path::PathBuf;
use std::process::ExitCode;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// JSON document printed by the binary.
#[derive(Serialize)]
struct RunReport<'a> {
    batch_id: String,
    summary: BatchSummary,
    notices: Vec<String>,
    files: Vec<FileReport>,
    result: &'a BatchResult,
}

fn execute(args: &[PathBuf]) -> Result<BatchResult, PipelineError> {
    let config = IntakeConfig::from_env()?;
    let runner = BatchRunner::new(config)?;
    match args {
        [single] if single.is_dir() => runner.run_directory(single),
        paths => runner.run(paths),
    }
}

/// CLI entry: `image-intake <directory | file...>`.
///
/// Prints the batch report as JSON on stdout. Exit code 2 on a fatal
/// batch-level error, 1 when no file was processed, 0 otherwise.
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if args.is_empty() {
        eprintln!("usage: {} <directory | file...>", config::APP_NAME);
        return ExitCode::from(2);
    }

    let result = match execute(&args) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Batch aborted");
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let report = RunReport {
        batch_id: result.batch_id.to_string(),
        summary: result.summary(),
        notices: result.notices.iter().map(BatchNotice::message).collect(),
        files: result.reports(),
        result: &result,
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: cannot serialize report: {e}");
            return ExitCode::from(2);
        }
    }

    if result.processed.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

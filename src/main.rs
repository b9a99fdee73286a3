// Main entry point - Logging setup and exit codes
use clap::Parser;
use grafana_regression::error::RegressionError;
use grafana_regression::presentation::cli::{Cli, run};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_MISMATCH: u8 = 1;
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let is_mismatch = err
                .downcast_ref::<RegressionError>()
                .is_some_and(RegressionError::is_mismatch);
            eprintln!("Error: {:#}", err);
            if is_mismatch {
                ExitCode::from(EXIT_MISMATCH)
            } else {
                ExitCode::from(EXIT_ERROR)
            }
        }
    }
}

// Entrypoint for the `bl` CLI.
// - Keeps `main` small: parse arguments, set up logging, hand off to
//   `cli::run`.
// - Errors are printed with their context chain and exit with status 1.

use std::process::ExitCode;

use brainlife::cli::{self, Cli};
use brainlife::logging::LoggingConfig;
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();
    LoggingConfig::new(cli.log_level.as_deref(), cli.json_logs).init();

    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

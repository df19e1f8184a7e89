//! Application entry point.
//!
//! Parses command-line arguments, merges configuration layers, and delegates
//! execution to [`runner::run`].

use sealexec::{cli, runner};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> ExitCode {
    let (parsed, matches) = match cli::parse_from(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(err) => err.exit(),
    };
    let merged = match cli::merge_with_config(&parsed, &matches) {
        Ok(merged) => merged,
        Err(err) => {
            drop(writeln!(io::stderr(), "sealexec: configuration error: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let max_level = if merged.verbose {
        Level::DEBUG
    } else {
        Level::ERROR
    };
    fmt()
        .with_writer(io::stderr)
        .with_max_level(max_level)
        .init();

    match runner::run(&merged) {
        Ok(result) => {
            if let Err(err) = runner::write_result(&result, io::stdout().lock()) {
                tracing::error!(error = %err, "failed to write result");
                return ExitCode::FAILURE;
            }
            runner::exit_code_for(&result)
        }
        Err(err) => {
            drop(writeln!(io::stderr(), "{:?}", miette::Report::new(err)));
            ExitCode::FAILURE
        }
    }
}

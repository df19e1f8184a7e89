//! CLI execution and result reporting.
//!
//! This module turns merged [`Cli`] values into an [`ExecutionRequest`],
//! picks the secret source the flags ask for, and writes the sanitized
//! result as JSON.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::exec::{ExecError, ExecutionRequest, execute};
use crate::result::ExecutionResult;
use crate::secrets::{JsonFileSecretSource, StaticSecretSource};

/// Build the execution request described by `cli`.
///
/// # Errors
///
/// Returns [`ExecError::EmptyCommand`] when no program was given.
pub fn request_from_cli(cli: &Cli) -> Result<ExecutionRequest, ExecError> {
    let (program, args) = cli.command.split_first().ok_or(ExecError::EmptyCommand)?;
    Ok(ExecutionRequest::new(program.as_str())
        .with_args(args)
        .with_environment(cli.environment.as_str())
        .with_timeout_ms(cli.timeout_ms))
}

/// Run the command described by `cli`.
///
/// Secrets come from `--secrets-file` when given; otherwise the command runs
/// with none injected.
///
/// # Errors
///
/// Returns any [`ExecError`] raised while fetching secrets or running the
/// command.
pub fn run(cli: &Cli) -> Result<ExecutionResult, ExecError> {
    let request = request_from_cli(cli)?;
    match &cli.secrets_file {
        Some(path) => execute(&JsonFileSecretSource::new(path.clone()), &request),
        None => {
            tracing::debug!("no secrets file configured; running without secrets");
            execute(&StaticSecretSource::default(), &request)
        }
    }
}

/// Write `result` to `out` as pretty-printed JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_result(result: &ExecutionResult, mut out: impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, result).context("serialize execution result")?;
    writeln!(out).context("write execution result")?;
    out.flush().context("flush execution result")
}

/// Process exit status mirroring the child's exit code.
///
/// Codes outside `1..=255`, including signal termination, map to a generic
/// failure.
#[must_use]
pub fn exit_code_for(result: &ExecutionResult) -> ExitCode {
    if result.success() {
        return ExitCode::SUCCESS;
    }
    u8::try_from(result.exit_code())
        .ok()
        .filter(|code| *code != 0)
        .map_or(ExitCode::FAILURE, ExitCode::from)
}

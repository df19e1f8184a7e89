//! Command execution with injected secrets.
//!
//! [`Executor::execute`] is the single entry point. One call validates the
//! request, fetches secrets for the requested environment, runs the command
//! with those secrets in its environment, and returns a sanitized
//! [`ExecutionResult`]. Nothing is retained between calls.
//!
//! # Resource limits
//!
//! The effective timeout is the requested one capped at
//! [`MAX_TIMEOUT_MS`]. A timed-out child receives `SIGTERM`, then `SIGKILL`
//! after [`KILL_GRACE_PERIOD`]. Each output stream keeps at most
//! [`MAX_CAPTURE_BYTES`]; anything beyond is drained and discarded.
//!
//! # No shell
//!
//! The program and its arguments are passed as a vector straight to the OS.
//! Arguments are never joined into a string that a shell would interpret.

pub mod display;
mod env;
mod error;
mod pipes;
mod process;
mod signal;

pub use env::{MergedEnvironment, merge_environment};
pub use error::ExecError;
pub use pipes::{CapturedStream, OutputStream};
pub use process::{ChildExit, ProcessEvent, ProcessState, SIGNAL_EXIT_CODE};

use std::{env as std_env, time::Duration};

use crate::result::ExecutionResult;
use crate::sanitize::{Redactor, sanitize_output};
use crate::secrets::{SecretSource, count_redactable};
use display::display_command;
use process::{RunLimits, run_process};

/// Environment used when a request names none.
pub const DEFAULT_ENVIRONMENT: &str = "development";
/// Timeout applied when a request asks for none.
pub const DEFAULT_TIMEOUT_MS: u64 = MAX_TIMEOUT_MS;
/// Hard ceiling on any requested timeout.
pub const MAX_TIMEOUT_MS: u64 = 300_000;
/// Bytes kept per output stream.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;
/// Delay between the graceful termination signal and the forced kill.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// A command to run and the environment whose secrets it receives.
///
/// # Examples
///
/// ```
/// use sealexec::exec::ExecutionRequest;
///
/// let request = ExecutionRequest::new("psql")
///     .with_args(["-c", "select 1"])
///     .with_environment("staging")
///     .with_timeout_ms(Some(10_000));
/// assert_eq!(request.args(), ["-c", "select 1"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    command: String,
    args: Vec<String>,
    environment: String,
    timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    /// Request to run `command` with no arguments in the default
    /// environment.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            timeout_ms: None,
        }
    }

    /// Replace the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Fetch secrets for `environment` instead of the default.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Request a timeout in milliseconds; `None` uses the default.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Program to run, as supplied.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Environment whose secrets are injected.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Requested timeout, before capping.
    #[must_use]
    pub const fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }
}

/// Timeout actually enforced for a request.
///
/// `None` and `Some(0)` select [`DEFAULT_TIMEOUT_MS`]; anything else is
/// capped at [`MAX_TIMEOUT_MS`].
///
/// # Examples
///
/// ```
/// use sealexec::exec::effective_timeout;
/// use std::time::Duration;
///
/// assert_eq!(effective_timeout(Some(600_000)), Duration::from_millis(300_000));
/// assert_eq!(effective_timeout(Some(1_500)), Duration::from_millis(1_500));
/// assert_eq!(effective_timeout(None), Duration::from_millis(300_000));
/// ```
#[must_use]
pub fn effective_timeout(requested_ms: Option<u64>) -> Duration {
    let requested = requested_ms
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    Duration::from_millis(requested.min(MAX_TIMEOUT_MS))
}

/// Runs commands with secrets from `S` injected into their environment.
#[derive(Debug, Clone)]
pub struct Executor<S> {
    source: S,
}

impl<S: SecretSource> Executor<S> {
    /// Build an executor backed by `source`.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Run `request` to completion and return its sanitized result.
    ///
    /// A non-zero exit code is reported through
    /// [`ExecutionResult::success`], not as an error.
    ///
    /// # Errors
    ///
    /// - [`ExecError::EmptyCommand`] when the command is blank; nothing is
    ///   fetched or spawned.
    /// - [`ExecError::SecretSource`] when secrets cannot be fetched; nothing
    ///   is spawned.
    /// - [`ExecError::Spawn`] when the program cannot be started.
    /// - [`ExecError::Timeout`] when the program outlives the effective
    ///   timeout.
    /// - [`ExecError::Io`] when supervising the process fails.
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError> {
        let program = request.command().trim();
        if program.is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let secrets = self.source.fetch_secrets(request.environment())?;
        let secrets_injected = count_redactable(&secrets);
        let redactor = Redactor::new(secrets.values().map(String::as_str));
        let limits = RunLimits {
            timeout: effective_timeout(request.timeout_ms()),
            grace: KILL_GRACE_PERIOD,
            max_capture_bytes: MAX_CAPTURE_BYTES,
        };
        tracing::info!(
            command = %display_command(program, request.args(), &redactor),
            environment = request.environment(),
            secrets = secrets_injected,
            timeout = ?limits.timeout,
            "executing command"
        );

        let environment = merge_environment(std_env::vars_os(), &secrets);
        drop(secrets);
        let completed = run_process(program, request.args(), environment, limits)?;

        let stdout = sanitize_output(
            completed.stdout.bytes(),
            completed.stdout.truncated(),
            MAX_CAPTURE_BYTES,
            &redactor,
        );
        let stderr = sanitize_output(
            completed.stderr.bytes(),
            completed.stderr.truncated(),
            MAX_CAPTURE_BYTES,
            &redactor,
        );
        let result = ExecutionResult::assemble(
            completed.exit.exit_code(),
            stdout,
            stderr,
            secrets_injected,
            MAX_CAPTURE_BYTES,
        );
        tracing::info!(
            exit_code = result.exit_code(),
            success = result.success(),
            "command finished"
        );
        Ok(result)
    }
}

/// Run `request` against `source`. See [`Executor::execute`].
///
/// # Errors
///
/// Propagates every [`ExecError`] from [`Executor::execute`].
///
/// # Examples
///
/// ```no_run
/// use sealexec::exec::{ExecutionRequest, execute};
/// use sealexec::secrets::StaticSecretSource;
///
/// let source = StaticSecretSource::from_pairs([("SECRET_KEY", "mysecretvalue123")]);
/// let request = ExecutionRequest::new("echo").with_args(["mysecretvalue123"]);
/// let result = execute(&source, &request).expect("echo runs");
/// assert_eq!(result.stdout(), "***REDACTED***\n");
/// ```
pub fn execute<S>(source: &S, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError>
where
    S: SecretSource + ?Sized,
{
    Executor::new(source).execute(request)
}

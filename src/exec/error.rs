//! Errors that abort an execution before a result is assembled.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others, so `#[expect]` cannot be used here.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use std::{io, time::Duration};

use miette::Diagnostic;
use thiserror::Error;

use super::process::{ProcessEvent, ProcessState};
use crate::secrets::SecretSourceError;

/// Failures of the execution call itself.
///
/// A command that runs to completion with a non-zero exit code is not an
/// error; it produces an [`ExecutionResult`](crate::result::ExecutionResult)
/// whose success flag is `false`.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    /// The command was empty or only whitespace. Nothing was fetched or
    /// spawned.
    #[error("command must not be empty")]
    #[diagnostic(
        code(sealexec::exec::empty_command),
        help("pass the program to run followed by its arguments")
    )]
    EmptyCommand,
    /// The secret source failed. No process was spawned.
    #[error(transparent)]
    #[diagnostic(transparent)]
    SecretSource(#[from] SecretSourceError),
    /// The operating system could not start the process.
    #[error("failed to start '{program}': {source}")]
    #[diagnostic(
        code(sealexec::exec::spawn),
        help("check that the program exists and is executable; no shell is involved")
    )]
    Spawn {
        /// Program that was requested.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The process outlived its timeout and was terminated.
    #[error("'{program}' did not finish within {timeout:?} and was terminated")]
    #[diagnostic(code(sealexec::exec::timeout))]
    Timeout {
        /// Program that timed out.
        program: String,
        /// Effective timeout that elapsed.
        timeout: Duration,
        /// Whether the process ignored the graceful signal and had to be
        /// killed.
        forced_kill: bool,
    },
    /// Waiting on or reading from the process failed.
    #[error("I/O failure while supervising the command: {0}")]
    #[diagnostic(code(sealexec::exec::io))]
    Io(#[source] io::Error),
    /// The process lifecycle was driven through an impossible transition.
    #[error("process lifecycle cannot move from {from:?} on {event:?}")]
    #[diagnostic(code(sealexec::exec::lifecycle))]
    Lifecycle {
        /// State before the event.
        from: ProcessState,
        /// Event that was rejected.
        event: ProcessEvent,
    },
}

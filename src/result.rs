//! Outcome of a completed command.
//!
//! [`ExecutionResult`] is the only value returned to callers on success. It
//! is assembled from already sanitized streams, so every text field is free
//! of raw secret values by construction.

use serde::Serialize;

use crate::sanitize::SanitizedStream;

/// Sanitized outcome of one command execution.
///
/// Serializes with camelCase keys; `warnings` is omitted when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
    stdout_truncated: bool,
    stderr_truncated: bool,
    secrets_injected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
}

impl ExecutionResult {
    /// Combine an exit code and two sanitized streams into a result.
    ///
    /// `max_bytes` is the capture ceiling quoted in truncation warnings.
    #[must_use]
    pub fn assemble(
        exit_code: i32,
        stdout: SanitizedStream,
        stderr: SanitizedStream,
        secrets_injected: usize,
        max_bytes: usize,
    ) -> Self {
        let stdout_truncated = stdout.truncated();
        let stderr_truncated = stderr.truncated();
        let warnings: Vec<String> = [("stdout", stdout_truncated), ("stderr", stderr_truncated)]
            .into_iter()
            .filter(|(_, truncated)| *truncated)
            .map(|(stream, _)| format!("{stream} truncated to {max_bytes} bytes"))
            .collect();
        Self {
            success: exit_code == 0,
            exit_code,
            stdout: stdout.into_text(),
            stderr: stderr.into_text(),
            stdout_truncated,
            stderr_truncated,
            secrets_injected,
            warnings: (!warnings.is_empty()).then_some(warnings),
        }
    }

    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    /// Exit status; `-1` when the command was killed by a signal.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Sanitized standard output.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Sanitized standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Whether standard output was cut at the capture ceiling.
    #[must_use]
    pub const fn stdout_truncated(&self) -> bool {
        self.stdout_truncated
    }

    /// Whether standard error was cut at the capture ceiling.
    #[must_use]
    pub const fn stderr_truncated(&self) -> bool {
        self.stderr_truncated
    }

    /// Number of non-empty secrets placed in the child environment.
    #[must_use]
    pub const fn secrets_injected(&self) -> usize {
        self.secrets_injected
    }

    /// Human-readable warnings, present only when something was truncated.
    #[must_use]
    pub fn warnings(&self) -> Option<&[String]> {
        self.warnings.as_deref()
    }
}

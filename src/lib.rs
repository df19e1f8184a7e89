//! Sealexec core library.
//!
//! Runs a single command with secrets for a named environment injected into
//! its process environment, bounded by a timeout and a per-stream capture
//! ceiling. Every byte of output returned to the caller has been truncated
//! and then scrubbed of the injected secret values, in raw, percent-encoded,
//! and base64 forms.

pub mod cli;
pub mod exec;
pub mod result;
pub mod runner;
pub mod sanitize;
pub mod secrets;

pub use exec::{ExecError, ExecutionRequest, Executor, execute};
pub use result::ExecutionResult;

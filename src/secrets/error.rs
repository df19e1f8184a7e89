//! Error type for secret sources.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others, so `#[expect]` cannot be used here.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

/// Failures raised while fetching secrets for an environment.
#[derive(Debug, Error, Diagnostic)]
pub enum SecretSourceError {
    /// The backing file could not be read.
    #[error("failed to read secrets file '{path}'")]
    #[diagnostic(code(sealexec::secrets::read))]
    Read {
        /// Path that was read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The backing file is not a valid secrets document.
    #[error("secrets file '{path}' is not a valid secrets document")]
    #[diagnostic(
        code(sealexec::secrets::parse),
        help("expected a JSON object mapping environment names to objects of string values")
    )]
    Parse {
        /// Path that was parsed.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The source holds no secrets for the requested environment.
    #[error("no secrets are defined for environment '{environment}'")]
    #[diagnostic(code(sealexec::secrets::unknown_environment))]
    UnknownEnvironment {
        /// Environment that was requested.
        environment: String,
    },
    /// The source could not be reached or refused the request.
    #[error("secret source unavailable for environment '{environment}': {message}")]
    #[diagnostic(code(sealexec::secrets::unavailable))]
    Unavailable {
        /// Environment that was requested.
        environment: String,
        /// Description supplied by the source.
        message: String,
    },
}

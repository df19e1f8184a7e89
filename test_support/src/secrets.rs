//! Scripted secret sources.

use sealexec::secrets::{SecretMap, SecretSource, SecretSourceError};
use std::cell::RefCell;

/// Secret source that records every environment it is asked for.
///
/// Answers with `secrets` for any environment, or with
/// [`SecretSourceError::Unavailable`] when built with [`Self::failing`].
#[derive(Debug, Default)]
pub struct RecordingSecretSource {
    secrets: Option<SecretMap>,
    requests: RefCell<Vec<String>>,
}

impl RecordingSecretSource {
    /// Source answering every fetch with `pairs`.
    pub fn with_pairs(pairs: &[(&str, &str)]) -> Self {
        let secrets = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        Self {
            secrets: Some(secrets),
            requests: RefCell::default(),
        }
    }

    /// Source failing every fetch.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Environments requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl SecretSource for RecordingSecretSource {
    fn fetch_secrets(&self, environment: &str) -> Result<SecretMap, SecretSourceError> {
        self.requests.borrow_mut().push(environment.to_owned());
        self.secrets
            .clone()
            .ok_or_else(|| SecretSourceError::Unavailable {
                environment: environment.to_owned(),
                message: String::from("secret store unreachable"),
            })
    }
}

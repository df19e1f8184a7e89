//! JSON file backed secret source.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use super::{SecretMap, SecretSource, SecretSourceError};

type SecretsDocument = IndexMap<String, SecretMap>;

/// Reads secrets from a JSON document keyed by environment name.
///
/// The file is read on every fetch so edits take effect on the next
/// execution:
///
/// ```json
/// {
///   "development": { "DATABASE_URL": "postgres://dev" },
///   "production": { "DATABASE_URL": "postgres://prod" }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileSecretSource {
    path: Utf8PathBuf,
}

impl JsonFileSecretSource {
    /// Create a source reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> Result<SecretsDocument, SecretSourceError> {
        let text =
            fs::read_to_string(self.path.as_std_path()).map_err(|source| SecretSourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&text).map_err(|source| SecretSourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl SecretSource for JsonFileSecretSource {
    fn fetch_secrets(&self, environment: &str) -> Result<SecretMap, SecretSourceError> {
        let mut document = self.load()?;
        let secrets = document.swap_remove(environment).ok_or_else(|| {
            SecretSourceError::UnknownEnvironment {
                environment: environment.to_owned(),
            }
        })?;
        tracing::debug!(
            path = %self.path,
            environment,
            count = secrets.len(),
            "loaded secrets from file"
        );
        Ok(secrets)
    }
}

//! Secret sources consulted once per execution.
//!
//! The engine never caches secrets: every call to
//! [`Executor::execute`](crate::exec::Executor::execute) asks its
//! [`SecretSource`] for a fresh [`SecretMap`], hands it to the child
//! environment and output sanitizer, and drops it when the call returns.

mod error;
mod file;

pub use error::SecretSourceError;
pub use file::JsonFileSecretSource;

use indexmap::IndexMap;

/// Secret name to secret value, in the order the source supplied them.
pub type SecretMap = IndexMap<String, String>;

/// Supplier of secret values for a named environment.
///
/// Implementations wrap whatever backing store holds the secrets (a remote
/// key-value service, a local file, an in-memory table). A failed fetch
/// aborts the execution before any process is spawned.
pub trait SecretSource {
    /// Fetch every secret defined for `environment`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretSourceError`] when the backing store cannot be read or
    /// does not know the environment.
    fn fetch_secrets(&self, environment: &str) -> Result<SecretMap, SecretSourceError>;
}

impl<S: SecretSource + ?Sized> SecretSource for &S {
    fn fetch_secrets(&self, environment: &str) -> Result<SecretMap, SecretSourceError> {
        (**self).fetch_secrets(environment)
    }
}

/// In-memory source returning the same secrets for every environment.
///
/// # Examples
///
/// ```
/// use sealexec::secrets::{SecretSource, StaticSecretSource};
///
/// let source = StaticSecretSource::from_pairs([("API_TOKEN", "abc123")]);
/// let secrets = source.fetch_secrets("staging").expect("static fetch");
/// assert_eq!(secrets.get("API_TOKEN").map(String::as_str), Some("abc123"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSecretSource {
    secrets: SecretMap,
}

impl StaticSecretSource {
    /// Wrap an existing secret map.
    #[must_use]
    pub const fn new(secrets: SecretMap) -> Self {
        Self { secrets }
    }

    /// Build a source from `(name, value)` pairs. Later duplicates win.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let secrets = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self { secrets }
    }
}

impl SecretSource for StaticSecretSource {
    fn fetch_secrets(&self, _environment: &str) -> Result<SecretMap, SecretSourceError> {
        Ok(self.secrets.clone())
    }
}

/// Count the secrets whose values are non-empty and therefore eligible for
/// redaction.
#[must_use]
pub fn count_redactable(secrets: &SecretMap) -> usize {
    secrets.values().filter(|value| !value.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn static_source_returns_same_map_for_any_environment() {
        let source = StaticSecretSource::from_pairs([("A", "1"), ("B", "2")]);
        let dev = source.fetch_secrets("development").expect("dev fetch");
        let prod = source.fetch_secrets("production").expect("prod fetch");
        assert_eq!(dev, prod);
        assert_eq!(dev.keys().collect::<Vec<_>>(), ["A", "B"]);
    }

    #[rstest]
    fn from_pairs_keeps_last_duplicate() {
        let source = StaticSecretSource::from_pairs([("A", "old"), ("A", "new")]);
        let secrets = source.fetch_secrets("any").expect("fetch");
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets.get("A").map(String::as_str), Some("new"));
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&[("A", "")], 0)]
    #[case(&[("A", "x"), ("B", ""), ("C", "secret")], 2)]
    fn count_redactable_skips_empty_values(#[case] pairs: &[(&str, &str)], #[case] expected: usize) {
        let secrets: SecretMap = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        assert_eq!(count_redactable(&secrets), expected);
    }
}

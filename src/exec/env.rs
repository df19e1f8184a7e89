//! Child environment construction.

use std::ffi::OsString;

use indexmap::IndexMap;

use crate::secrets::SecretMap;

/// Environment handed to the child, in ambient order with secrets last.
pub type MergedEnvironment = IndexMap<OsString, OsString>;

/// Overlay `secrets` onto `ambient`.
///
/// Every secret name is set to its value, replacing an ambient variable of
/// the same name in place; everything else passes through untouched. The
/// caller's environment is read, never modified.
///
/// # Examples
///
/// ```
/// use sealexec::exec::merge_environment;
/// use sealexec::secrets::SecretMap;
/// use std::ffi::OsString;
///
/// let mut secrets = SecretMap::new();
/// secrets.insert("TOKEN".into(), "from-vault".into());
/// let merged = merge_environment([("TOKEN", "stale"), ("HOME", "/home/me")], &secrets);
/// assert_eq!(merged.get(&OsString::from("TOKEN")), Some(&OsString::from("from-vault")));
/// assert_eq!(merged.get(&OsString::from("HOME")), Some(&OsString::from("/home/me")));
/// ```
#[must_use]
pub fn merge_environment<I, K, V>(ambient: I, secrets: &SecretMap) -> MergedEnvironment
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    let mut merged: MergedEnvironment = ambient
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();
    for (name, value) in secrets {
        merged.insert(OsString::from(name), OsString::from(value));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn secrets(pairs: &[(&str, &str)]) -> SecretMap {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    fn os(text: &str) -> OsString {
        OsString::from(text)
    }

    #[rstest]
    fn empty_secrets_pass_ambient_through() {
        let merged = merge_environment([("PATH", "/bin"), ("LANG", "C")], &SecretMap::new());
        let expected: Vec<_> = vec![(os("PATH"), os("/bin")), (os("LANG"), os("C"))];
        assert_eq!(merged.into_iter().collect::<Vec<_>>(), expected);
    }

    #[rstest]
    fn secret_overrides_ambient_value_in_place() {
        let merged = merge_environment(
            [("A", "1"), ("API_KEY", "ambient"), ("B", "2")],
            &secrets(&[("API_KEY", "secret")]),
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get_index_of(&os("API_KEY")), Some(1));
        assert_eq!(merged.get(&os("API_KEY")), Some(&os("secret")));
    }

    #[rstest]
    fn new_secrets_are_appended() {
        let merged = merge_environment([("A", "1")], &secrets(&[("NEW", "x"), ("EMPTY", "")]));
        let keys: Vec<_> = merged.keys().cloned().collect();
        assert_eq!(keys, [os("A"), os("NEW"), os("EMPTY")]);
        assert_eq!(merged.get(&os("EMPTY")), Some(&os("")));
    }
}

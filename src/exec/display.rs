//! Redacted rendering of command lines for logs.
//!
//! Arguments are masked twice. Values attached to a credential-named key or
//! flag are hidden whatever they contain, whether written `key=value`,
//! `--key=value` or `--key value`. Every argument then goes through the same
//! [`Redactor`] used for output, so a fetched secret is hidden anywhere.

use crate::sanitize::{REDACTION_MARKER, Redactor};

/// Key names, compared case-insensitively with `-` folded to `_`.
const CREDENTIAL_KEYS: [&str; 10] = [
    "password",
    "passwd",
    "token",
    "secret",
    "api_key",
    "apikey",
    "auth",
    "authorization",
    "access_key",
    "private_key",
];

fn is_credential_name(name: &str) -> bool {
    let folded = name.trim().trim_start_matches('-').replace('-', "_");
    CREDENTIAL_KEYS
        .iter()
        .any(|known| folded.eq_ignore_ascii_case(known))
}

/// Key of an inline `key=value` argument when the key names a credential.
///
/// Leading dashes are allowed, so flags written `--key=value` count.
///
/// # Examples
/// ```
/// use sealexec::exec::display::credential_key;
/// assert_eq!(credential_key("--api-key=abc"), Some("--api-key"));
/// assert_eq!(credential_key("path=/tmp"), None);
/// ```
#[must_use]
pub fn credential_key(arg: &str) -> Option<&str> {
    let (raw_key, _) = arg.split_once('=')?;
    let key = raw_key.trim();
    is_credential_name(key).then_some(key)
}

/// Whether `arg` is a bare flag such as `--password` whose value follows as
/// the next argument.
#[must_use]
pub fn is_credential_flag(arg: &str) -> bool {
    arg.starts_with('-') && !arg.contains('=') && is_credential_name(arg)
}

/// Redact a single argument for display.
///
/// # Examples
/// ```
/// use sealexec::exec::display::redact_argument;
/// use sealexec::sanitize::Redactor;
///
/// let secrets = Redactor::new(["hunter22"]);
/// assert_eq!(redact_argument("--pw=hunter22", &secrets), "--pw=***REDACTED***");
/// assert_eq!(redact_argument("token=unfetched", &secrets), "token=***REDACTED***");
/// ```
#[must_use]
pub fn redact_argument(arg: &str, redactor: &Redactor) -> String {
    credential_key(arg).map_or_else(
        || redactor.redact(arg).into_owned(),
        |key| format!("{key}={REDACTION_MARKER}"),
    )
}

/// Render `program` and `args` as a single redacted line.
#[must_use]
pub fn display_command(program: &str, args: &[String], redactor: &Redactor) -> String {
    let mut line = redactor.redact(program).into_owned();
    let mut value_follows = false;
    for arg in args {
        line.push(' ');
        if value_follows {
            line.push_str(REDACTION_MARKER);
        } else {
            line.push_str(&redact_argument(arg, redactor));
        }
        value_follows = is_credential_flag(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("--password=hunter2", Some("--password"))]
    #[case("  Access-Key = AKIA ", Some("Access-Key"))]
    #[case("-token=x", Some("-token"))]
    #[case("password", None)]
    #[case("--output=secrets.yml", None)]
    #[case("tokens=3", None)]
    fn credential_keys_are_found_in_inline_pairs(
        #[case] arg: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(credential_key(arg), expected);
    }

    #[rstest]
    #[case("--password", true)]
    #[case("--private-key", true)]
    #[case("password", false)]
    #[case("--password=x", false)]
    #[case("--verbose", false)]
    fn bare_credential_flags_are_recognised(#[case] arg: &str, #[case] expected: bool) {
        assert_eq!(is_credential_flag(arg), expected);
    }

    #[rstest]
    fn fetched_secret_inside_ordinary_flag_is_masked_by_value() {
        let redactor = Redactor::new(["s3cr3t-value"]);
        assert_eq!(
            redact_argument("--connect=db://user:s3cr3t-value@host", &redactor),
            "--connect=db://user:***REDACTED***@host"
        );
        assert_eq!(redact_argument("--region=eu-west-1", &redactor), "--region=eu-west-1");
    }

    #[rstest]
    fn display_command_masks_secret_values_anywhere() {
        let redactor = Redactor::new(["mysecretvalue123"]);
        let args = vec![
            String::from("The secret is mysecretvalue123"),
            String::from("api_key=visible-before"),
            String::from("plain"),
        ];
        let line = display_command("echo", &args, &redactor);
        assert_eq!(
            line,
            "echo The secret is ***REDACTED*** api_key=***REDACTED*** plain"
        );
    }

    #[rstest]
    fn value_after_credential_flag_is_masked() {
        let args = ["--user", "admin", "--password", "not-fetched", "--retries", "3"]
            .map(String::from)
            .to_vec();
        let line = display_command("login", &args, &Redactor::default());
        assert_eq!(
            line,
            "login --user admin --password ***REDACTED*** --retries 3"
        );
    }
}

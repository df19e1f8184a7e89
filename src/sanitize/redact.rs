//! Secret redaction over raw and commonly re-encoded forms.
//!
//! Commands frequently echo secrets back after encoding them, for example a
//! percent-encoded connection string in a log line or a base64 basic-auth
//! header. Each secret is therefore expanded into every form in the encoding
//! table below and all of them are masked.

use std::borrow::Cow;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

/// Marker substituted for every redacted occurrence.
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// Secrets shorter than this (in characters) are only masked literally.
pub const MIN_ENCODED_SECRET_CHARS: usize = 4;

/// An encoding could not produce a searchable form of a secret.
#[derive(Debug, Error)]
#[error("{encoding} encoding produced an empty form")]
pub struct EncodingError {
    encoding: &'static str,
}

type EncodeFn = fn(&str) -> Result<Cow<'_, str>, EncodingError>;

#[derive(Clone, Copy)]
struct SecretEncoding {
    name: &'static str,
    min_chars: usize,
    encode: EncodeFn,
}

/// Characters `encodeURIComponent`-style encoders leave as they are but
/// strict percent-encoding escapes.
const COMPONENT_SAFE: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Forms each secret is searched for. Append new encodings here.
const ENCODINGS: [SecretEncoding; 4] = [
    SecretEncoding {
        name: "raw",
        min_chars: 1,
        encode: raw_form,
    },
    SecretEncoding {
        name: "percent",
        min_chars: MIN_ENCODED_SECRET_CHARS,
        encode: percent_form,
    },
    SecretEncoding {
        name: "percent-component",
        min_chars: MIN_ENCODED_SECRET_CHARS,
        encode: component_form,
    },
    SecretEncoding {
        name: "base64",
        min_chars: MIN_ENCODED_SECRET_CHARS,
        encode: base64_form,
    },
];

fn non_empty<'a>(
    form: Cow<'a, str>,
    encoding: &'static str,
) -> Result<Cow<'a, str>, EncodingError> {
    if form.is_empty() {
        Err(EncodingError { encoding })
    } else {
        Ok(form)
    }
}

fn raw_form(value: &str) -> Result<Cow<'_, str>, EncodingError> {
    non_empty(Cow::Borrowed(value), "raw")
}

fn percent_form(value: &str) -> Result<Cow<'_, str>, EncodingError> {
    non_empty(urlencoding::encode(value), "percent")
}

/// Percent form that keeps `!'()*` literal. A `%` in the value is itself
/// escaped as `%25`, so each replaced triplet can only come from its
/// character.
fn component_form(value: &str) -> Result<Cow<'_, str>, EncodingError> {
    let strict = urlencoding::encode(value);
    let relaxed = COMPONENT_SAFE
        .iter()
        .fold(strict.into_owned(), |form, (escaped, literal)| {
            form.replace(escaped, literal)
        });
    non_empty(Cow::Owned(relaxed), "percent-component")
}

fn base64_form(value: &str) -> Result<Cow<'_, str>, EncodingError> {
    non_empty(Cow::Owned(STANDARD.encode(value)), "base64")
}

/// Masks every searchable form of a fixed set of secret values.
///
/// # Examples
///
/// ```
/// use sealexec::sanitize::{REDACTION_MARKER, Redactor};
///
/// let redactor = Redactor::new(["hunter22"]);
/// let masked = redactor.redact("pw=hunter22 b64=aHVudGVyMjI=");
/// assert_eq!(
///     masked,
///     format!("pw={REDACTION_MARKER} b64={REDACTION_MARKER}")
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    patterns: Vec<String>,
}

impl Redactor {
    /// Expand `values` into their searchable forms. Empty values are ignored.
    #[must_use]
    pub fn new<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut patterns = Vec::new();
        for value in values.into_iter().filter(|value| !value.is_empty()) {
            let chars = value.chars().count();
            for encoding in ENCODINGS.iter().filter(|encoding| chars >= encoding.min_chars) {
                match (encoding.encode)(value) {
                    Ok(form) => patterns.push(form.into_owned()),
                    Err(err) => {
                        tracing::debug!(encoding = encoding.name, %err, "skipping secret form");
                    }
                }
            }
        }
        // Longest first so a secret embedding another is masked whole.
        patterns.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        patterns.dedup();
        Self { patterns }
    }

    /// Number of distinct forms searched for.
    #[must_use]
    pub const fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Replace every occurrence of every form in `text` with
    /// [`REDACTION_MARKER`].
    #[must_use]
    pub fn redact<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut masked = Cow::Borrowed(text);
        for pattern in &self.patterns {
            if masked.contains(pattern.as_str()) {
                masked = Cow::Owned(masked.replace(pattern.as_str(), REDACTION_MARKER));
            }
        }
        masked
    }
}

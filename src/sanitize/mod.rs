//! Output sanitization: bound each captured stream, then mask secrets.
//!
//! Truncation always runs before redaction so a redaction marker can never
//! be cut in half by the byte ceiling, and so the cost of masking is bounded
//! by the ceiling rather than by the raw output size.

mod redact;
mod truncate;

pub use redact::{EncodingError, MIN_ENCODED_SECRET_CHARS, REDACTION_MARKER, Redactor};
pub use truncate::{TRUNCATION_NOTICE, Truncated, truncate};

/// A captured stream after truncation and redaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedStream {
    text: String,
    truncated: bool,
}

impl SanitizedStream {
    /// Sanitized text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether output was cut, either during capture or here.
    #[must_use]
    pub const fn truncated(&self) -> bool {
        self.truncated
    }

    /// Consume the stream returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Decode, bound, and redact one captured stream.
///
/// `capture_truncated` reports that bytes were already dropped while the
/// stream was read; the notice is then appended even if the decoded text
/// fits under `max_bytes`.
///
/// # Examples
///
/// ```
/// use sealexec::sanitize::{REDACTION_MARKER, Redactor, sanitize_output};
///
/// let redactor = Redactor::new(["opensesame"]);
/// let stream = sanitize_output(b"key: opensesame\n", false, 1024, &redactor);
/// assert_eq!(stream.text(), format!("key: {REDACTION_MARKER}\n"));
/// assert!(!stream.truncated());
/// ```
#[must_use]
pub fn sanitize_output(
    raw: &[u8],
    capture_truncated: bool,
    max_bytes: usize,
    redactor: &Redactor,
) -> SanitizedStream {
    let decoded = String::from_utf8_lossy(raw);
    let bounded = truncate(&decoded, max_bytes, capture_truncated);
    let text = redactor.redact(&bounded.text).into_owned();
    SanitizedStream {
        text,
        truncated: bounded.truncated,
    }
}

//! Byte-bounded truncation that never splits a UTF-8 character.

use std::borrow::Cow;

/// Appended once to a stream whose output was cut at the capture ceiling.
pub const TRUNCATION_NOTICE: &str = "\n\n[output truncated: capture limit reached]";

/// Outcome of fitting text under a byte ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated<'a> {
    /// Text that fits within the ceiling, notice included when cut.
    pub text: Cow<'a, str>,
    /// Whether the text was cut and the notice appended.
    pub truncated: bool,
}

/// Fit `text` within `max_bytes`.
///
/// Text is cut when it exceeds `max_bytes` or when `force` reports that
/// bytes were already dropped upstream. A cut keeps the longest prefix that
/// ends on a character boundary and leaves room for [`TRUNCATION_NOTICE`],
/// whose length is counted in bytes.
///
/// # Examples
///
/// ```
/// use sealexec::sanitize::{TRUNCATION_NOTICE, truncate};
///
/// let short = truncate("hello", 1024, false);
/// assert!(!short.truncated);
///
/// let long = "é".repeat(600);
/// let cut = truncate(&long, 256, false);
/// assert!(cut.truncated);
/// assert!(cut.text.len() <= 256);
/// assert!(cut.text.ends_with(TRUNCATION_NOTICE));
/// ```
#[must_use]
pub fn truncate(text: &str, max_bytes: usize, force: bool) -> Truncated<'_> {
    if text.len() <= max_bytes && !force {
        return Truncated {
            text: Cow::Borrowed(text),
            truncated: false,
        };
    }
    let budget = max_bytes.saturating_sub(TRUNCATION_NOTICE.len());
    let prefix = prefix_within(text, budget);
    let mut cut = String::with_capacity(prefix.len() + TRUNCATION_NOTICE.len());
    cut.push_str(prefix);
    cut.push_str(TRUNCATION_NOTICE);
    Truncated {
        text: Cow::Owned(cut),
        truncated: true,
    }
}

/// Longest prefix of `text` no longer than `budget` bytes.
fn prefix_within(text: &str, budget: usize) -> &str {
    let mut end = budget.min(text.len());
    // A UTF-8 scalar spans at most four bytes, so this steps back at most
    // three times.
    while !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    text.get(..end).unwrap_or_default()
}

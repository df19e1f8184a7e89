//! Error formatting helpers for stable, deterministic test assertions.

use std::error::Error;

/// Join an error and its sources, outermost first, with `": "`.
///
/// Report types wrapping an error can be passed via `AsRef::as_ref`.
///
/// # Examples
///
/// ```ignore
/// let err = std::io::Error::other("oops");
/// assert_eq!(display_error_chain(&err), "oops");
/// ```
pub fn display_error_chain(e: &(dyn Error + 'static)) -> String {
    let mut messages = vec![e.to_string()];
    let mut next = e.source();
    while let Some(source) = next {
        messages.push(source.to_string());
        next = source.source();
    }
    messages.join(": ")
}

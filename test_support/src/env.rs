//! Scoped environment variable changes for tests.
//!
//! `std::env::set_var` and `remove_var` are `unsafe` in Rust 2024 because they
//! mutate process-global state. [`ScopedEnv`] holds a global lock for its
//! whole lifetime, so changes made through it never race with another
//! `ScopedEnv`, and restores every touched variable on drop.
//!
//! # Examples
//!
//! ```rust,ignore
//! use test_support::ScopedEnv;
//!
//! let env = ScopedEnv::new().set("FOO", "bar").remove("BAZ");
//! assert_eq!(std::env::var("FOO").unwrap(), "bar");
//! drop(env); // FOO and BAZ are restored here.
//! ```

use std::ffi::OsString;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// RAII guard over a set of environment changes.
pub struct ScopedEnv {
    saved: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl fmt::Debug for ScopedEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedEnv")
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}

impl Default for ScopedEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopedEnv {
    /// Acquire the global environment lock without changing anything yet.
    pub fn new() -> Self {
        let guard = ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            saved: Vec::new(),
            _guard: guard,
        }
    }

    /// Set `name` to `value` until the guard drops.
    #[must_use]
    pub fn set(mut self, name: &str, value: &str) -> Self {
        self.remember(name);
        // SAFETY: `ENV_LOCK` is held for the lifetime of `self`.
        unsafe { std::env::set_var(name, value) };
        self
    }

    /// Remove `name` until the guard drops.
    #[must_use]
    pub fn remove(mut self, name: &str) -> Self {
        self.remember(name);
        // SAFETY: `ENV_LOCK` is held for the lifetime of `self`.
        unsafe { std::env::remove_var(name) };
        self
    }

    fn remember(&mut self, name: &str) {
        if self.saved.iter().all(|(saved, _)| saved != name) {
            self.saved.push((name.to_owned(), std::env::var_os(name)));
        }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            // SAFETY: `ENV_LOCK` is still held; `_guard` drops after this body.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(&name, value),
                    None => std::env::remove_var(&name),
                }
            }
        }
    }
}

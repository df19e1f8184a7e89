//! Test utilities for command execution.
//!
//! Helpers for writing throwaway shell scripts and secrets files, scoping
//! environment changes, and scripted secret sources.

pub mod env;
pub mod error;
pub mod secrets;

pub use env::ScopedEnv;

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create an executable `/bin/sh` script named `name` running `body`.
///
/// Returns the temporary directory and the path to the script.
pub fn fake_script(name: &str, body: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("perms");
    }
    (dir, path)
}

/// Write a secrets document mapping each environment to its pairs.
///
/// Returns the temporary directory and the path to `secrets.json`.
pub fn secrets_file(environments: &[(&str, &[(&str, &str)])]) -> (TempDir, PathBuf) {
    let document: serde_json::Map<String, serde_json::Value> = environments
        .iter()
        .map(|(environment, pairs)| {
            let secrets: serde_json::Map<String, serde_json::Value> = pairs
                .iter()
                .map(|(name, value)| ((*name).to_owned(), serde_json::Value::from(*value)))
                .collect();
            ((*environment).to_owned(), serde_json::Value::Object(secrets))
        })
        .collect();
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("secrets.json");
    let text = serde_json::to_string_pretty(&document).expect("serialize secrets");
    fs::write(&path, text).expect("write secrets file");
    (dir, path)
}

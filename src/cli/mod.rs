//! Command line interface definition using clap.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a
//! discovered `sealexec` configuration file, then `SEALEXEC_*` environment
//! variables, then flags given on the command line.

use camino::Utf8PathBuf;
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use ortho_config::declarative::LayerComposition;
use ortho_config::figment::{Figment, providers::Env};
use ortho_config::uncased::Uncased;
use ortho_config::{
    ConfigDiscovery, MergeComposer, MergeLayer, OrthoConfig, OrthoError, OrthoMergeExt,
    OrthoResult, sanitize_value,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::sync::Arc;

use crate::exec::DEFAULT_ENVIRONMENT;

const CONFIG_ENV_VAR: &str = "SEALEXEC_CONFIG_PATH";
const ENV_PREFIX: &str = "SEALEXEC_";

/// Fields that configuration layers may supply.
const LAYERED_FIELDS: [&str; 4] = ["secrets_file", "environment", "timeout_ms", "verbose"];

/// Run a command with injected secrets and print its redacted result as JSON.
#[derive(Debug, Parser, Serialize, Deserialize, OrthoConfig)]
#[command(author, version, about, long_about = None)]
#[ortho_config(prefix = "SEALEXEC")]
pub struct Cli {
    /// JSON file mapping environment names to their secrets.
    ///
    /// Without one, the command runs with no secrets injected.
    #[arg(short, long, value_name = "FILE")]
    pub secrets_file: Option<Utf8PathBuf>,

    /// Environment whose secrets are injected.
    #[arg(short, long, value_name = "NAME", default_value = DEFAULT_ENVIRONMENT)]
    #[ortho_config(default = default_environment())]
    pub environment: String,

    /// Timeout in milliseconds; capped at five minutes.
    #[arg(short, long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Enable verbose diagnostic logging on stderr.
    #[arg(short, long)]
    #[ortho_config(default = false)]
    pub verbose: bool,

    /// Program to run followed by its arguments.
    ///
    /// `OrthoConfig` merging ignores this field; CLI parsing supplies it.
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    #[serde(skip)]
    #[ortho_config(skip_cli)]
    pub command: Vec<String>,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            secrets_file: None,
            environment: default_environment(),
            timeout_ms: None,
            verbose: false,
            command: Vec::new(),
        }
    }
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_owned()
}

/// Parse CLI arguments.
///
/// Returns both the parsed CLI struct and the `ArgMatches` required for
/// configuration merging.
///
/// # Errors
///
/// Returns a `clap::Error` when parsing fails or help/version was requested.
pub fn parse_from<I, T>(iter: I) -> Result<(Cli, ArgMatches), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut command = Cli::command();
    let matches = command.try_get_matches_from_mut(iter)?;
    // Clone matches before from_arg_matches_mut consumes the values.
    let matches_for_merge = matches.clone();
    let mut matches_for_parse = matches;
    let cli = Cli::from_arg_matches_mut(&mut matches_for_parse)
        .map_err(|clap_err| clap_err.with_cmd(&command))?;
    Ok((cli, matches_for_merge))
}

/// Return the prefixed environment provider for CLI configuration.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
}

fn config_discovery() -> ConfigDiscovery {
    ConfigDiscovery::builder("sealexec")
        .env_var(CONFIG_ENV_VAR)
        .build()
}

/// Return `true` when no CLI overrides were supplied.
///
/// The merge pipeline treats an empty JSON object as "no overrides".
fn is_empty_value(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::Object(map) if map.is_empty())
}

fn cli_overrides_from_matches(cli: &Cli, matches: &ArgMatches) -> OrthoResult<serde_json::Value> {
    let value = sanitize_value(cli)?;
    let mut map = match value {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(Arc::new(OrthoError::Validation {
                key: String::from("cli"),
                message: format!(
                    "expected parsed CLI values to serialize to an object, got {other:?}"
                ),
            }));
        }
    };

    map.remove("command");
    for field in LAYERED_FIELDS {
        if matches.value_source(field) != Some(ValueSource::CommandLine) {
            map.remove(field);
        }
    }

    Ok(serde_json::Value::Object(map))
}

/// Merge configuration layers over the parsed CLI values.
///
/// Precedence, lowest first: built-in defaults, the configuration file,
/// `SEALEXEC_*` variables, then flags given explicitly on the command line.
/// The file is the one named by `SEALEXEC_CONFIG_PATH`, otherwise the first
/// `sealexec` file found by standard discovery relative to the process
/// working directory; `sealexec` has no flag that moves that search root.
/// The command vector is never layered: a `command` key in a file or the
/// environment is discarded in favour of the trailing arguments.
///
/// # Errors
///
/// Returns an [`ortho_config::OrthoError`] if layer composition or merging
/// fails.
pub fn merge_with_config(cli: &Cli, matches: &ArgMatches) -> OrthoResult<Cli> {
    let mut errors = Vec::new();
    let mut composer = MergeComposer::with_capacity(4);

    match sanitize_value(&Cli::default()) {
        Ok(value) => composer.push_defaults(value),
        Err(err) => errors.push(err),
    }
    for layer in discovered_file_layers(&mut errors) {
        composer.push_layer(layer);
    }
    match environment_layer() {
        Ok(value) => composer.push_environment(value),
        Err(err) => errors.push(err),
    }
    match cli_overrides_from_matches(cli, matches) {
        Ok(value) if is_empty_value(&value) => {}
        Ok(value) => composer.push_cli(value),
        Err(err) => errors.push(err),
    }

    let merged = LayerComposition::new(composer.layers(), errors)
        .into_merge_result(Cli::merge_from_layers)?;
    Ok(Cli {
        command: cli.command.clone(),
        ..merged
    })
}

/// File layers from discovery. Optional-candidate errors only matter when
/// no file loaded at all.
fn discovered_file_layers(errors: &mut Vec<Arc<OrthoError>>) -> Vec<MergeLayer<'static>> {
    let mut discovered = config_discovery().compose_layers();
    errors.append(&mut discovered.required_errors);
    if discovered.value.is_empty() {
        errors.append(&mut discovered.optional_errors);
    } else {
        tracing::debug!(layers = discovered.value.len(), "loaded configuration file");
    }
    discovered.value
}

fn environment_layer() -> OrthoResult<serde_json::Value> {
    let provider = env_provider()
        .map(|key| Uncased::new(key.as_str().to_ascii_uppercase()))
        .split("__");
    Figment::from(provider)
        .extract::<serde_json::Value>()
        .into_ortho_merge()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn trailing_arguments_keep_their_hyphens() {
        let (cli, _) = parse_from(["sealexec", "--", "ls", "-la", "--color=never"])
            .expect("parse command line");
        assert_eq!(cli.command, ["ls", "-la", "--color=never"]);
        assert_eq!(cli.environment, DEFAULT_ENVIRONMENT);
        assert_eq!(cli.timeout_ms, None);
        assert!(cli.secrets_file.is_none());
    }

    #[rstest]
    fn flags_are_parsed() {
        let (cli, matches) = parse_from([
            "sealexec",
            "-v",
            "--secrets-file",
            "secrets.json",
            "--environment",
            "production",
            "--timeout-ms",
            "1500",
            "--",
            "env",
        ])
        .expect("parse command line");
        assert!(cli.verbose);
        assert_eq!(cli.secrets_file.as_deref().map(|p| p.as_str()), Some("secrets.json"));
        assert_eq!(cli.environment, "production");
        assert_eq!(cli.timeout_ms, Some(1500));
        assert_eq!(
            matches.value_source("environment"),
            Some(ValueSource::CommandLine)
        );
    }

    #[rstest]
    fn missing_command_is_rejected() {
        let err = parse_from(["sealexec", "--verbose"]).expect_err("command required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[rstest]
    fn overrides_contain_only_explicit_flags() {
        let (cli, matches) =
            parse_from(["sealexec", "--timeout-ms", "10", "true"]).expect("parse command line");
        let overrides = cli_overrides_from_matches(&cli, &matches).expect("overrides");
        let serde_json::Value::Object(map) = overrides else {
            panic!("overrides should be an object");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), ["timeout_ms"]);
    }

    #[rstest]
    fn defaults_leave_no_overrides() {
        let (cli, matches) = parse_from(["sealexec", "true"]).expect("parse command line");
        let overrides = cli_overrides_from_matches(&cli, &matches).expect("overrides");
        assert!(is_empty_value(&overrides));
    }
}

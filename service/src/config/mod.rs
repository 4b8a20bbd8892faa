//! Configuration loading for the composer
//!
//! Configuration files are YAML with `${VAR:-default}` environment variable
//! substitution. Missing sections and fields fall back to
//! [`ComposerConfig::default`].

use composer_core::{ComposerConfig, ComposerError, Result};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// `${VAR}` or `${VAR:-default}`
static ENV_VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::(-)?([^}]*))?\}").expect("Valid environment variable pattern")
});

/// Load any deserializable configuration from a `YAML` file
///
/// # Errors
///
/// Returns `ComposerError::IoError` if the file cannot be read and
/// `ComposerError::ConfigError` if the YAML cannot be parsed
pub fn load_config<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), "loading configuration");
    parse_config(&contents)
}

/// Parse configuration from `YAML` text
///
/// # Errors
///
/// Returns `ComposerError::ConfigError` if the YAML cannot be parsed
pub fn parse_config<T: for<'de> Deserialize<'de>>(contents: &str) -> Result<T> {
    let substituted = substitute_env_vars(contents);
    serde_yaml::from_str(&substituted)
        .map_err(|e| ComposerError::config(format!("Failed to parse YAML config: {e}")))
}

/// Load and validate a [`ComposerConfig`]
///
/// # Errors
///
/// Returns the load error or the first validation failure
pub fn load_composer_config(path: &Path) -> Result<ComposerConfig> {
    let config: ComposerConfig = load_config(path)?;
    config.validate()?;
    Ok(config)
}

/// Substitute environment variables in the format `${VAR:-default}`
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_REGEX
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(3).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string()
}

//! Environment variable parsing for settings.
//!
//! Responsibilities:
//! - Read and parse `VARIABLES_*` environment variables.
//! - Apply parsed values to a `SettingsLoader` instance.
//!
//! Does NOT handle:
//! - Building the final `Settings` or bounds checks (see builder.rs).
//! - .env file loading (handled by `SettingsLoader::load_dotenv`).
//!
//! Invariants:
//! - Empty or whitespace-only environment variables are treated as unset.
//! - Returned values are trimmed (leading/trailing whitespace removed).
//! - Unparseable values return `ConfigError::InvalidValue`.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use super::builder::SettingsLoader;
use super::error::ConfigError;

pub const ENV_BASE_URL: &str = "VARIABLES_BASE_URL";
pub const ENV_API_TOKEN: &str = "VARIABLES_API_TOKEN";
pub const ENV_POLL_INTERVAL_SECS: &str = "VARIABLES_POLL_INTERVAL_SECS";
pub const ENV_BLOCK_BEFORE_FIRST_RESOLVE: &str = "VARIABLES_BLOCK_BEFORE_FIRST_RESOLVE";
pub const ENV_BLOCK_TIMEOUT_MS: &str = "VARIABLES_BLOCK_TIMEOUT_MS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "VARIABLES_HTTP_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "VARIABLES_MAX_RETRIES";
pub const ENV_INCLUDE_RESOURCE_ATTRIBUTES: &str = "VARIABLES_INCLUDE_RESOURCE_ATTRIBUTES";
pub const ENV_INCLUDE_BAGGAGE: &str = "VARIABLES_INCLUDE_BAGGAGE";

/// Read an environment variable, returning None if unset, empty, or whitespace-only.
/// Returns the trimmed value (leading/trailing whitespace removed) if present.
pub fn env_var_or_none(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == s.len() {
            Some(s)
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_env<T: FromStr>(key: &str, expected: &str) -> Result<Option<T>, ConfigError> {
    env_var_or_none(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
                var: key.to_string(),
                message: expected.to_string(),
            })
        })
        .transpose()
}

/// Apply environment variable configuration to the loader.
pub fn apply_env(loader: &mut SettingsLoader) -> Result<(), ConfigError> {
    if let Some(url) = env_var_or_none(ENV_BASE_URL) {
        loader.set_base_url(Some(url));
    }
    if let Some(token) = env_var_or_none(ENV_API_TOKEN) {
        loader.set_api_token(Some(SecretString::new(token.into())));
    }
    if let Some(secs) = parse_env::<u64>(ENV_POLL_INTERVAL_SECS, "must be a number")? {
        loader.set_poll_interval(Some(Duration::from_secs(secs)));
    }
    if let Some(block) = parse_env::<bool>(ENV_BLOCK_BEFORE_FIRST_RESOLVE, "must be true or false")?
    {
        loader.set_block_before_first_resolve(Some(block));
    }
    if let Some(ms) = parse_env::<u64>(ENV_BLOCK_TIMEOUT_MS, "must be a number")? {
        loader.set_block_timeout(Some(Duration::from_millis(ms)));
    }
    if let Some(secs) = parse_env::<u64>(ENV_HTTP_TIMEOUT_SECS, "must be a number")? {
        loader.set_http_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(retries) =
        parse_env::<usize>(ENV_MAX_RETRIES, "must be a non-negative integer")?
    {
        loader.set_max_retries(Some(retries));
    }
    if let Some(include) =
        parse_env::<bool>(ENV_INCLUDE_RESOURCE_ATTRIBUTES, "must be true or false")?
    {
        loader.set_include_resource_attributes(Some(include));
    }
    if let Some(include) = parse_env::<bool>(ENV_INCLUDE_BAGGAGE, "must be true or false")? {
        loader.set_include_baggage(Some(include));
    }
    Ok(())
}

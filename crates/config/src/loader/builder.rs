//! Settings loader builder implementation.
//!
//! Responsibilities:
//! - Provide a builder-pattern `SettingsLoader` for layered settings.
//! - Support loading from `.env`, environment variables, and direct builder methods.
//! - Validate bounds and build the final `Settings`.
//!
//! Does NOT handle:
//! - Direct environment variable parsing logic (delegated to env.rs).
//! - Variable declarations (see `VariablesConfig::from_path`).
//!
//! Invariants / Assumptions:
//! - Builder methods take precedence over environment variables.
//! - Environment variables take precedence over defaults.
//! - `load_dotenv()` must be called explicitly to enable `.env` file loading.
//! - The `DOTENV_DISABLED` variable is checked before `dotenvy::dotenv()` is called.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use super::env::apply_env;
use super::error::ConfigError;
use crate::constants::{
    MAX_BLOCK_TIMEOUT_MS, MAX_HTTP_TIMEOUT_SECS, MAX_MAX_RETRIES, MAX_POLL_INTERVAL_SECS,
    MIN_POLL_INTERVAL_SECS,
};
use crate::settings::Settings;

/// Settings loader that layers builder values over environment variables and defaults.
#[derive(Default)]
pub struct SettingsLoader {
    base_url: Option<String>,
    api_token: Option<SecretString>,
    poll_interval: Option<Duration>,
    block_before_first_resolve: Option<bool>,
    block_timeout: Option<Duration>,
    http_timeout: Option<Duration>,
    max_retries: Option<usize>,
    include_resource_attributes: Option<bool>,
    include_baggage: Option<bool>,
}

impl SettingsLoader {
    /// Create a new settings loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if dotenv loading is disabled via environment variable.
    fn dotenv_disabled() -> bool {
        matches!(
            std::env::var("DOTENV_DISABLED").ok().as_deref(),
            Some("true") | Some("1")
        )
    }

    /// Load environment variables from .env file if present.
    ///
    /// If `DOTENV_DISABLED` environment variable is set to "true" or "1",
    /// the .env file will not be loaded (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but has invalid syntax or
    /// cannot be read. Missing `.env` files are silently ignored.
    ///
    /// SAFETY: Error messages never include raw .env line contents to prevent secret leakage.
    pub fn load_dotenv(self) -> Result<Self, ConfigError> {
        if Self::dotenv_disabled() {
            return Ok(self);
        }

        match dotenvy::dotenv() {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Loaded .env file");
                Ok(self)
            }
            Err(dotenvy::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                Ok(self)
            }
            Err(dotenvy::Error::LineParse(_, idx)) => {
                Err(ConfigError::DotenvParse { error_index: idx })
            }
            Err(dotenvy::Error::Io(io_err)) => Err(ConfigError::DotenvIo {
                kind: io_err.kind(),
            }),
            Err(_) => Err(ConfigError::DotenvUnknown),
        }
    }

    /// Read settings from environment variables.
    ///
    /// Values already set through builder methods are kept.
    pub fn from_env(self) -> Result<Self, ConfigError> {
        let mut from_env = SettingsLoader::new();
        apply_env(&mut from_env)?;
        Ok(self.layer_over(from_env))
    }

    /// Keep `self`'s values, filling gaps from `lower`.
    fn layer_over(self, lower: SettingsLoader) -> Self {
        Self {
            base_url: self.base_url.or(lower.base_url),
            api_token: self.api_token.or(lower.api_token),
            poll_interval: self.poll_interval.or(lower.poll_interval),
            block_before_first_resolve: self
                .block_before_first_resolve
                .or(lower.block_before_first_resolve),
            block_timeout: self.block_timeout.or(lower.block_timeout),
            http_timeout: self.http_timeout.or(lower.http_timeout),
            max_retries: self.max_retries.or(lower.max_retries),
            include_resource_attributes: self
                .include_resource_attributes
                .or(lower.include_resource_attributes),
            include_baggage: self.include_baggage.or(lower.include_baggage),
        }
    }

    /// Set the backend base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the backend API token.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::new(token.into().into()));
        self
    }

    /// Set the remote polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set whether the remote provider blocks for its first fetch.
    pub fn with_block_before_first_resolve(mut self, block: bool) -> Self {
        self.block_before_first_resolve = Some(block);
        self
    }

    /// Set the initial blocking timeout.
    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = Some(timeout);
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set whether resource attributes are merged into resolution attributes.
    pub fn with_include_resource_attributes(mut self, include: bool) -> Self {
        self.include_resource_attributes = Some(include);
        self
    }

    /// Set whether baggage entries are merged into resolution attributes.
    pub fn with_include_baggage(mut self, include: bool) -> Self {
        self.include_baggage = Some(include);
        self
    }

    /// Validate and build the final settings.
    pub fn build(self) -> Result<Settings, ConfigError> {
        let defaults = Settings::default();

        let base_url = self
            .base_url
            .as_deref()
            .map(validate_base_url)
            .transpose()?;

        let settings = Settings {
            base_url,
            api_token: self.api_token,
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            block_before_first_resolve: self
                .block_before_first_resolve
                .unwrap_or(defaults.block_before_first_resolve),
            block_timeout: self.block_timeout.unwrap_or(defaults.block_timeout),
            refresh_timeout: defaults.refresh_timeout,
            http_timeout: self.http_timeout.unwrap_or(defaults.http_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            include_resource_attributes: self
                .include_resource_attributes
                .unwrap_or(defaults.include_resource_attributes),
            include_baggage: self.include_baggage.unwrap_or(defaults.include_baggage),
        };

        Self::validate_bounds(&settings)?;
        Ok(settings)
    }

    /// Validates interval, timeout and retry bounds.
    fn validate_bounds(settings: &Settings) -> Result<(), ConfigError> {
        let poll_secs = settings.poll_interval.as_secs();
        if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&poll_secs) {
            return Err(ConfigError::InvalidPollInterval {
                message: format!(
                    "must be between {} and {} seconds (got {})",
                    MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS, poll_secs
                ),
            });
        }

        if settings.block_timeout.as_millis() > u128::from(MAX_BLOCK_TIMEOUT_MS) {
            return Err(ConfigError::InvalidTimeout {
                message: format!(
                    "block timeout exceeds maximum allowed value of {} ms",
                    MAX_BLOCK_TIMEOUT_MS
                ),
            });
        }

        let http_secs = settings.http_timeout.as_secs();
        if http_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                message: "http timeout must be greater than 0 seconds".to_string(),
            });
        }
        if http_secs > MAX_HTTP_TIMEOUT_SECS {
            return Err(ConfigError::InvalidTimeout {
                message: format!(
                    "http timeout exceeds maximum allowed value of {} seconds",
                    MAX_HTTP_TIMEOUT_SECS
                ),
            });
        }

        if settings.max_retries > MAX_MAX_RETRIES {
            return Err(ConfigError::InvalidMaxRetries {
                message: format!(
                    "must be between 0 and {} (got {})",
                    MAX_MAX_RETRIES, settings.max_retries
                ),
            });
        }

        Ok(())
    }

    // Internal setters for use by other loader modules

    pub(crate) fn set_base_url(&mut self, url: Option<String>) {
        self.base_url = url;
    }

    pub(crate) fn set_api_token(&mut self, token: Option<SecretString>) {
        self.api_token = token;
    }

    pub(crate) fn set_poll_interval(&mut self, interval: Option<Duration>) {
        self.poll_interval = interval;
    }

    pub(crate) fn set_block_before_first_resolve(&mut self, block: Option<bool>) {
        self.block_before_first_resolve = block;
    }

    pub(crate) fn set_block_timeout(&mut self, timeout: Option<Duration>) {
        self.block_timeout = timeout;
    }

    pub(crate) fn set_http_timeout(&mut self, timeout: Option<Duration>) {
        self.http_timeout = timeout;
    }

    pub(crate) fn set_max_retries(&mut self, retries: Option<usize>) {
        self.max_retries = retries;
    }

    pub(crate) fn set_include_resource_attributes(&mut self, include: Option<bool>) {
        self.include_resource_attributes = include;
    }

    pub(crate) fn set_include_baggage(&mut self, include: Option<bool>) {
        self.include_baggage = include;
    }
}

/// Validates a backend base URL.
///
/// Validation rules:
/// - Parse as an absolute URL
/// - Require scheme is http or https
/// - Require host is present
fn validate_base_url(raw: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        var: "base_url".into(),
        message: format!("must be an absolute http(s) URL with a host: {e}"),
    })?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ConfigError::InvalidValue {
            var: "base_url".into(),
            message: format!("scheme must be http or https, got: {scheme}"),
        });
    }

    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidValue {
            var: "base_url".into(),
            message: "host is required".into(),
        });
    }

    Ok(parsed)
}

//! Engine settings shared by providers and the HTTP backend.
//!
//! Responsibilities:
//! - Define polling, blocking, HTTP and ambient-attribute settings.
//! - Provide defaults via `Default`, not magic numbers.
//!
//! Does NOT handle:
//! - Loading settings from env or `.env` files (see `loader` module).
//! - Variable declarations themselves (see `types` module).

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::constants::{
    DEFAULT_BLOCK_TIMEOUT_MS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_RETRIES,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REFRESH_TIMEOUT_MS,
};

/// Runtime settings for the variables engine.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend base URL; `None` means only local declarations are used.
    pub base_url: Option<Url>,
    /// Bearer token for the backend.
    pub api_token: Option<SecretString>,
    /// Interval between remote polls.
    pub poll_interval: Duration,
    /// Whether the remote provider constructor waits for the first fetch.
    pub block_before_first_resolve: bool,
    /// Upper bound on that initial wait.
    pub block_timeout: Duration,
    /// Upper bound on a synchronous forced refresh.
    pub refresh_timeout: Duration,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Maximum retries for rate-limited or unavailable backends.
    pub max_retries: usize,
    /// Merge process resource attributes into resolution attributes.
    pub include_resource_attributes: bool,
    /// Merge ambient baggage entries into resolution attributes.
    pub include_baggage: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            block_before_first_resolve: true,
            block_timeout: Duration::from_millis(DEFAULT_BLOCK_TIMEOUT_MS),
            refresh_timeout: Duration::from_millis(DEFAULT_REFRESH_TIMEOUT_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            include_resource_attributes: true,
            include_baggage: true,
        }
    }
}

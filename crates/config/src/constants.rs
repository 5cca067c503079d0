//! Centralized constants for the managed variables workspace.
//!
//! This module contains default values used across crates to avoid
//! magic number duplication and improve maintainability.

// =============================================================================
// Rollout Defaults
// =============================================================================

/// Reserved rollout key that routes to the highest-versioned variant.
pub const LATEST_VARIANT_KEY: &str = "latest";

/// Tolerance applied when checking that rollout weights sum to at most 1.0.
///
/// Weights are usually written as decimal fractions (0.1, 0.2, ...) that are
/// not exactly representable, so a strict comparison would reject valid
/// rollouts such as `{a: 0.7, b: 0.2, c: 0.1}`.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Separator between variable name and targeting key in the bucketing input.
pub const BUCKET_KEY_SEPARATOR: &str = ":";

// =============================================================================
// Provider Defaults
// =============================================================================

/// Default remote polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default time to wait for the first remote fetch, in milliseconds.
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 2000;

/// Default synchronous force-refresh timeout in milliseconds.
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 5000;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Default maximum number of retries for rate-limited or unavailable backends.
pub const DEFAULT_MAX_RETRIES: usize = 3;

// =============================================================================
// Bounds
// =============================================================================

/// Minimum allowed polling interval in seconds.
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;

/// Maximum allowed polling interval in seconds (24 hours).
pub const MAX_POLL_INTERVAL_SECS: u64 = 86400;

/// Maximum allowed blocking timeout in milliseconds (5 minutes).
pub const MAX_BLOCK_TIMEOUT_MS: u64 = 300_000;

/// Maximum allowed HTTP timeout in seconds (10 minutes).
pub const MAX_HTTP_TIMEOUT_SECS: u64 = 600;

/// Maximum allowed retry count.
pub const MAX_MAX_RETRIES: usize = 10;

// =============================================================================
// Backend Paths
// =============================================================================

/// REST path for reading and writing the variables document.
pub const VARIABLES_ENDPOINT: &str = "/v1/variables";

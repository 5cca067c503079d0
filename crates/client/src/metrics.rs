//! Metrics for resolution, fetching and snapshot publication.
//!
//! This module records engine metrics through the `metrics` facade:
//! - Resolution counters labelled by source
//! - Fetch duration histogram, retry and failure counters
//! - Snapshot swap and callback panic counters
//!
//! # What this module does NOT handle:
//! - Metrics exposition/export (install any `metrics` recorder in the application)
//!
//! # Invariants
//! - Label names are consistent: `source`, `error_category`
//! - Recording is infallible and zero-cost when no recorder is installed

use std::time::Duration;

use crate::error::VariablesError;
use crate::resolver::ResolutionSource;

/// Metric name for resolution counter.
pub const METRIC_RESOLUTIONS_TOTAL: &str = "variables_resolutions_total";

/// Metric name for fetch duration histogram.
pub const METRIC_FETCH_DURATION: &str = "variables_fetch_duration_seconds";

/// Metric name for fetch retry counter.
pub const METRIC_FETCH_RETRIES_TOTAL: &str = "variables_fetch_retries_total";

/// Metric name for fetch failure counter.
pub const METRIC_FETCH_FAILURES_TOTAL: &str = "variables_fetch_failures_total";

/// Metric name for snapshot swap counter.
pub const METRIC_SNAPSHOT_SWAPS_TOTAL: &str = "variables_snapshot_swaps_total";

/// Metric name for callback panic counter.
pub const METRIC_CALLBACK_PANICS_TOTAL: &str = "variables_callback_panics_total";

/// Error categories for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport-level errors or unreadable responses
    Transport,
    /// HTTP 4xx client errors
    Http4xx,
    /// HTTP 5xx server errors
    Http5xx,
    /// Timeouts
    Timeout,
    /// Invalid configuration documents
    Model,
    /// Unknown/unclassified errors
    Unknown,
}

impl ErrorCategory {
    /// Returns the string label for this error category.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Http4xx => "http_4xx",
            ErrorCategory::Http5xx => "http_5xx",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Model => "model",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl From<&VariablesError> for ErrorCategory {
    fn from(error: &VariablesError) -> Self {
        match error {
            VariablesError::ConfigFetch { status: None, .. } => ErrorCategory::Transport,
            VariablesError::ConfigFetch {
                status: Some(status),
                ..
            } => {
                if (400..500).contains(status) {
                    ErrorCategory::Http4xx
                } else if (500..600).contains(status) {
                    ErrorCategory::Http5xx
                } else {
                    ErrorCategory::Unknown
                }
            }
            VariablesError::Timeout(_) => ErrorCategory::Timeout,
            VariablesError::Model(_) => ErrorCategory::Model,
            _ => ErrorCategory::Unknown,
        }
    }
}

pub(crate) fn record_resolution(source: ResolutionSource) {
    metrics::counter!(METRIC_RESOLUTIONS_TOTAL, "source" => source.as_str()).increment(1);
}

pub(crate) fn record_fetch_duration(duration: Duration) {
    metrics::histogram!(METRIC_FETCH_DURATION).record(duration.as_secs_f64());
}

pub(crate) fn record_fetch_retry() {
    metrics::counter!(METRIC_FETCH_RETRIES_TOTAL).increment(1);
}

pub(crate) fn record_fetch_failure(error: &VariablesError) {
    metrics::counter!(METRIC_FETCH_FAILURES_TOTAL,
        "error_category" => ErrorCategory::from(error).as_str(),
    )
    .increment(1);
}

pub(crate) fn record_snapshot_swap() {
    metrics::counter!(METRIC_SNAPSHOT_SWAPS_TOTAL).increment(1);
}

pub(crate) fn record_callback_panic() {
    metrics::counter!(METRIC_CALLBACK_PANICS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_as_str() {
        assert_eq!(ErrorCategory::Transport.as_str(), "transport");
        assert_eq!(ErrorCategory::Http4xx.as_str(), "http_4xx");
        assert_eq!(ErrorCategory::Http5xx.as_str(), "http_5xx");
        assert_eq!(ErrorCategory::Timeout.as_str(), "timeout");
        assert_eq!(ErrorCategory::Model.as_str(), "model");
        assert_eq!(ErrorCategory::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_error_categorization() {
        let transport = VariablesError::ConfigFetch {
            message: "connection refused".to_string(),
            status: None,
        };
        assert_eq!(ErrorCategory::from(&transport), ErrorCategory::Transport);

        let unauthorized = VariablesError::ConfigFetch {
            message: "unauthorized".to_string(),
            status: Some(401),
        };
        assert_eq!(ErrorCategory::from(&unauthorized), ErrorCategory::Http4xx);

        let unavailable = VariablesError::ConfigFetch {
            message: "unavailable".to_string(),
            status: Some(503),
        };
        assert_eq!(ErrorCategory::from(&unavailable), ErrorCategory::Http5xx);

        let timeout = VariablesError::Timeout(Duration::from_secs(1));
        assert_eq!(ErrorCategory::from(&timeout), ErrorCategory::Timeout);

        assert_eq!(
            ErrorCategory::from(&VariablesError::ProviderClosed),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_resolution(ResolutionSource::Default);
        record_fetch_duration(Duration::from_millis(5));
        record_fetch_retry();
        record_fetch_failure(&VariablesError::ProviderClosed);
        record_snapshot_swap();
        record_callback_panic();
    }
}

//! Error types for the variables engine.
//!
//! Responsibilities:
//! - Define the error taxonomy shared by providers, backends, the registry
//!   and the administrative surface.
//! - Classify which failures are worth retrying.
//!
//! Does NOT handle:
//! - Hot-path degradation. `Variable::get` never returns these; failures are
//!   carried in `ResolutionResult::error` instead.
//!
//! Invariants:
//! - Errors never carry the API token or raw response bodies beyond a short message.

use std::time::Duration;

use thiserror::Error;
use variables_config::ModelError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, VariablesError>;

/// Errors that can occur while fetching, validating or publishing variables.
#[derive(Error, Debug)]
pub enum VariablesError {
    /// Network or backend failure while fetching or pushing configuration.
    #[error("Failed to fetch variables configuration: {message}")]
    ConfigFetch {
        message: String,
        status: Option<u16>,
    },

    /// A served value does not satisfy the declared type or schema.
    #[error("Variable '{variable}' failed schema validation: {message}")]
    SchemaValidation { variable: String, message: String },

    /// Strict push found existing variants incompatible with a new schema.
    #[error("Schema conflict for {} variant(s): {}", .conflicts.len(), .conflicts.join("; "))]
    ConfigConflict { conflicts: Vec<String> },

    /// The name and every alias are unknown.
    #[error("Variable not found: {0}")]
    NotFound(String),

    /// A blocking wait exceeded its timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A variable with this name is already registered.
    #[error("Variable '{0}' is already registered")]
    DuplicateVariable(String),

    /// The provider has been closed.
    #[error("Provider is closed")]
    ProviderClosed,

    /// Invalid model data.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl VariablesError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConfigFetch { status: None, .. } => true,
            Self::ConfigFetch {
                status: Some(status),
                ..
            } => Self::is_retryable_status(*status),
            Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Check if an HTTP status code is retryable.
    ///
    /// Retryable status codes:
    /// - 429: Too Many Requests (rate limiting)
    /// - 502: Bad Gateway (transient server error)
    /// - 503: Service Unavailable (transient server error)
    /// - 504: Gateway Timeout (transient server error)
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 502 | 503 | 504)
    }

    pub(crate) fn fetch(message: impl Into<String>) -> Self {
        Self::ConfigFetch {
            message: message.into(),
            status: None,
        }
    }
}

impl From<reqwest::Error> for VariablesError {
    fn from(err: reqwest::Error) -> Self {
        Self::ConfigFetch {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

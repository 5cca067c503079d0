//! Logging initialization for applications embedding the engine.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! the application's call. `LogConfig` is the convenience for doing so.
//!
//! # Usage
//!
//! ```rust,ignore
//! use variables_client::logging::{LogConfig, LogFormat};
//!
//! LogConfig::new()
//!     .with_format(LogFormat::Json)
//!     .with_default_directive("variables_client=debug")
//!     .init()?;
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors that can occur while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {message}")]
    InvalidFilter { directive: String, message: String },

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Configuration for the global `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset or empty.
    pub default_directive: String,
    pub format: LogFormat,
    /// Whether events include their target (module path).
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            format: LogFormat::default(),
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the fallback filter directive.
    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Builder method to set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Builder method to control target output.
    pub fn with_target(mut self, enable: bool) -> Self {
        self.with_target = enable;
        self
    }

    /// The filter `init` installs: `RUST_LOG` if set, else the default directive.
    ///
    /// # Errors
    /// Returns `InvalidFilter` if the default directive does not parse.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.default_directive).map_err(|e| LoggingError::InvalidFilter {
            directive: self.default_directive.clone(),
            message: e.to_string(),
        })
    }

    /// Install the global subscriber.
    ///
    /// # Errors
    /// Returns `InvalidFilter` for a bad directive, or `Init` if a global
    /// subscriber is already installed.
    pub fn init(&self) -> Result<(), LoggingError> {
        use tracing_subscriber::fmt;

        let filter = self.env_filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match self.format {
            LogFormat::Pretty => registry
                .with(fmt::layer().with_target(self.with_target))
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(self.with_target))
                .try_init(),
        };
        installed.map_err(|e| LoggingError::Init(e.to_string()))
    }
}

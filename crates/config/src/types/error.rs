//! Error types for the variable data model.
//!
//! Responsibilities:
//! - Define error variants for every invariant the data model enforces.
//! - Wrap codec failures (JSON, YAML, file IO) raised while decoding documents.
//!
//! Does NOT handle:
//! - Settings loading failures (see `loader::ConfigError`).
//! - Runtime resolution failures (reported by the client crate, never raised).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for data model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while constructing or decoding variable configuration.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A rollout weight is negative, above 1.0, or not a finite number.
    #[error("Invalid weight {weight} for '{key}': weights must be within [0, 1]")]
    InvalidWeight { key: String, weight: f64 },

    /// The rollout allocates more than the full probability mass.
    #[error("Rollout weights sum to {total}, which exceeds 1.0")]
    WeightsExceedOne { total: f64 },

    /// A rollout references a variant key the variable does not declare.
    #[error("Variable '{variable}' references unknown variant '{key}'")]
    UnknownVariant { variable: String, key: String },

    /// A variant uses a key reserved by the rollout model.
    #[error("Variable '{variable}' declares reserved variant key '{key}'")]
    ReservedVariantKey { variable: String, key: String },

    /// A variant's embedded key disagrees with the map key it is stored under.
    #[error("Variant stored under '{expected}' declares key '{actual}'")]
    VariantKeyMismatch { expected: String, actual: String },

    /// A variable entry disagrees with the map key it is stored under.
    #[error("Variable stored under '{expected}' declares name '{actual}'")]
    VariableNameMismatch { expected: String, actual: String },

    /// A variable name is empty.
    #[error("Variable name must not be empty")]
    EmptyName,

    /// A variable lists its own name as an alias.
    #[error("Variable '{0}' cannot alias itself")]
    SelfAlias(String),

    /// The same variable name appears twice in one collection.
    #[error("Duplicate variable '{0}'")]
    DuplicateVariable(String),

    /// A regex condition carries a pattern that does not compile.
    #[error("Invalid regex pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// JSON decoding or encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decoding failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Reading a declaration file failed.
    #[error("Failed to read variables file at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not map to a known format.
    #[error("Unsupported variables file format: {0}")]
    UnsupportedFormat(PathBuf),
}

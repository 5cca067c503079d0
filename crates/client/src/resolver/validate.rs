//! Validation of served values against the caller's declared type.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

/// Turns a variant's serialized value into the caller's type.
///
/// Implemented for any `Fn(&str) -> Result<T, String>` closure, and by
/// [`JsonValidator`] for every `DeserializeOwned` type.
pub trait Validate<T>: Send + Sync {
    /// Validate and decode `serialized`, describing the failure on error.
    fn validate(&self, serialized: &str) -> Result<T, String>;
}

impl<T, F> Validate<T> for F
where
    F: Fn(&str) -> Result<T, String> + Send + Sync,
{
    fn validate(&self, serialized: &str) -> Result<T, String> {
        self(serialized)
    }
}

/// Decodes the serialized value as JSON into `T`.
pub struct JsonValidator<T>(PhantomData<fn() -> T>);

impl<T> JsonValidator<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonValidator")
    }
}

impl<T: DeserializeOwned> Validate<T> for JsonValidator<T> {
    fn validate(&self, serialized: &str) -> Result<T, String> {
        serde_json::from_str(serialized).map_err(|e| e.to_string())
    }
}

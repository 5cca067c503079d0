//! Variant value objects.

use serde::{Deserialize, Serialize};

/// An immutable named value a variable can resolve to.
///
/// `serialized_value` holds the JSON text of the value. It is decoded and
/// validated against the caller's declared type only at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Key this variant is addressed by in rollouts.
    ///
    /// May be omitted on the wire, in which case the enclosing map key is used.
    #[serde(default)]
    pub key: String,
    /// JSON-encoded value.
    pub serialized_value: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional monotonically increasing version used by the `latest` sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl Variant {
    /// Create an unversioned variant.
    pub fn new(key: impl Into<String>, serialized_value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            serialized_value: serialized_value.into(),
            description: None,
            version: None,
        }
    }

    /// Create a variant from any JSON value.
    pub fn from_json(key: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::new(key, value.to_string())
    }

    /// Builder method to set the version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parse the serialized value as untyped JSON.
    pub fn json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.serialized_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_key_defaults_when_absent() {
        let variant: Variant = serde_json::from_str(r#"{"serialized_value": "\"hi\""}"#).unwrap();
        assert!(variant.key.is_empty());
        assert_eq!(variant.json_value().unwrap(), serde_json::json!("hi"));
    }

    #[test]
    fn test_optional_fields_skipped_when_unset() {
        let json = serde_json::to_value(Variant::new("on", "true")).unwrap();
        assert!(json.get("version").is_none());
        assert!(json.get("description").is_none());

        let json = serde_json::to_value(Variant::new("on", "true").with_version(3)).unwrap();
        assert_eq!(json["version"], 3);
    }
}

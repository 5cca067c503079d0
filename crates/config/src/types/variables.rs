//! The full variables document exchanged with backends and declaration files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::variable::{VariableConfig, VariableConfigWire};

/// A collection of variable configs keyed by name.
///
/// Wire shape: `{"variables": {<name>: {...}}}`. A variable entry may omit
/// `name`, in which case the map key is used.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "VariablesConfigWire")]
pub struct VariablesConfig {
    pub variables: BTreeMap<String, VariableConfig>,
}

#[derive(Deserialize)]
struct VariablesConfigWire {
    #[serde(default)]
    variables: BTreeMap<String, VariableConfigWire>,
}

impl TryFrom<VariablesConfigWire> for VariablesConfig {
    type Error = ModelError;

    fn try_from(wire: VariablesConfigWire) -> Result<Self, Self::Error> {
        let mut variables = BTreeMap::new();
        for (key, mut entry) in wire.variables {
            if entry.name.is_empty() {
                entry.name = key.clone();
            } else if entry.name != key {
                return Err(ModelError::VariableNameMismatch {
                    expected: key,
                    actual: entry.name,
                });
            }
            variables.insert(key, VariableConfig::try_from(entry)?);
        }
        Ok(Self { variables })
    }
}

impl VariablesConfig {
    /// Build a collection from individual configs.
    ///
    /// # Errors
    /// Returns `ModelError::DuplicateVariable` if two configs share a name.
    pub fn from_variables(
        configs: impl IntoIterator<Item = VariableConfig>,
    ) -> Result<Self, ModelError> {
        let mut variables = BTreeMap::new();
        for config in configs {
            let name = config.name().to_string();
            if variables.insert(name.clone(), config).is_some() {
                return Err(ModelError::DuplicateVariable(name));
            }
        }
        Ok(Self { variables })
    }

    /// Look up one variable by its canonical name.
    pub fn get(&self, name: &str) -> Option<&VariableConfig> {
        self.variables.get(name)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Union of both collections; for names present in both, `other`'s
    /// explicitly set fields win (see `VariableConfig` merge rules).
    pub fn merge(&self, other: &VariablesConfig) -> VariablesConfig {
        let mut variables = self.variables.clone();
        for (name, incoming) in &other.variables {
            let merged = match variables.get(name) {
                Some(existing) => existing.merged_with(incoming),
                None => incoming.clone(),
            };
            variables.insert(name.clone(), merged);
        }
        VariablesConfig { variables }
    }

    /// Decode from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ModelError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a declaration file, choosing the codec from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            Some("yaml" | "yml") => Self::from_yaml_str(&content)?,
            _ => return Err(ModelError::UnsupportedFormat(path.to_path_buf())),
        };
        tracing::debug!(
            path = %path.display(),
            variables = config.len(),
            "Loaded variable declarations"
        );
        Ok(config)
    }
}

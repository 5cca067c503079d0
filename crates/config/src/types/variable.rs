//! Per-variable configuration snapshots.
//!
//! Responsibilities:
//! - Bundle a variable's variants, base rollout, ordered overrides, schema and aliases.
//! - Validate variant references when the config is built or decoded.
//! - Answer pure queries used by the resolver (matching rollout, target lookup).
//!
//! Does NOT handle:
//! - Publishing snapshots or notifying listeners (see the client crate providers).
//! - Hashing targeting keys into fractions.
//!
//! Invariants:
//! - A `VariableConfig` is immutable once built; changes produce a new value.
//! - Every key referenced by the base rollout or any override exists in `variants`
//!   or is the `latest` sentinel.
//! - No variant is stored under the reserved `latest` key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::Attributes;
use super::error::ModelError;
use super::rollout::{Rollout, RolloutOverride, RolloutTarget};
use super::variant::Variant;
use crate::constants::LATEST_VARIANT_KEY;

/// Immutable configuration for one named variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VariableConfigWire", into = "VariableConfigWire")]
pub struct VariableConfig {
    name: String,
    variants: BTreeMap<String, Variant>,
    rollout: Rollout,
    overrides: Vec<RolloutOverride>,
    json_schema: Option<Value>,
    description: Option<String>,
    aliases: Vec<String>,
}

/// Wire representation of a variable; `name` may be supplied by the enclosing map.
#[derive(Serialize, Deserialize)]
pub(crate) struct VariableConfigWire {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    variants: BTreeMap<String, Variant>,
    #[serde(default)]
    rollout: Rollout,
    #[serde(default)]
    overrides: Vec<RolloutOverride>,
    #[serde(default)]
    json_schema: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

impl TryFrom<VariableConfigWire> for VariableConfig {
    type Error = ModelError;

    fn try_from(wire: VariableConfigWire) -> Result<Self, Self::Error> {
        let mut builder = VariableConfig::builder(wire.name)
            .rollout(wire.rollout)
            .aliases(wire.aliases);
        for (key, mut variant) in wire.variants {
            if variant.key.is_empty() {
                variant.key = key.clone();
            } else if variant.key != key {
                return Err(ModelError::VariantKeyMismatch {
                    expected: key,
                    actual: variant.key,
                });
            }
            builder = builder.variant(variant);
        }
        for rule in wire.overrides {
            builder = builder.override_rule(rule);
        }
        if let Some(schema) = wire.json_schema {
            builder = builder.json_schema(schema);
        }
        if let Some(description) = wire.description {
            builder = builder.description(description);
        }
        builder.build()
    }
}

impl From<VariableConfig> for VariableConfigWire {
    fn from(config: VariableConfig) -> Self {
        Self {
            name: config.name,
            variants: config.variants,
            rollout: config.rollout,
            overrides: config.overrides,
            json_schema: config.json_schema,
            description: config.description,
            aliases: config.aliases,
        }
    }
}

impl VariableConfig {
    /// Start building a config for `name`.
    pub fn builder(name: impl Into<String>) -> VariableConfigBuilder {
        VariableConfigBuilder::new(name)
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variants by key.
    pub fn variants(&self) -> &BTreeMap<String, Variant> {
        &self.variants
    }

    /// Look up one variant.
    pub fn variant(&self, key: &str) -> Option<&Variant> {
        self.variants.get(key)
    }

    /// Base rollout used when no override matches.
    pub fn rollout(&self) -> &Rollout {
        &self.rollout
    }

    /// Overrides in evaluation order.
    pub fn overrides(&self) -> &[RolloutOverride] {
        &self.overrides
    }

    /// JSON schema describing the variable's value type, if declared.
    pub fn json_schema(&self) -> Option<&Value> {
        self.json_schema.as_ref()
    }

    /// Human-readable description, if declared.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Alternative names this variable answers to.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The variant with the highest version. Unversioned variants never qualify.
    pub fn latest_variant(&self) -> Option<&Variant> {
        self.variants
            .values()
            .filter(|v| v.version.is_some())
            .max_by(|a, b| a.version.cmp(&b.version).then_with(|| a.key.cmp(&b.key)))
    }

    /// Map a rollout target onto a concrete variant.
    pub fn variant_for(&self, target: RolloutTarget<'_>) -> Option<&Variant> {
        match target {
            RolloutTarget::Named(key) => self.variant(key),
            RolloutTarget::Latest => self.latest_variant(),
        }
    }

    /// The rollout of the first override whose conditions all hold, else the base rollout.
    pub fn matching_rollout(&self, attributes: &Attributes) -> &Rollout {
        self.overrides
            .iter()
            .find(|rule| rule.matches(attributes))
            .map_or(&self.rollout, |rule| &rule.rollout)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        if self.variants.contains_key(LATEST_VARIANT_KEY) {
            return Err(ModelError::ReservedVariantKey {
                variable: self.name.clone(),
                key: LATEST_VARIANT_KEY.to_string(),
            });
        }
        if self.aliases.iter().any(|alias| *alias == self.name) {
            return Err(ModelError::SelfAlias(self.name.clone()));
        }

        let rollouts =
            std::iter::once(&self.rollout).chain(self.overrides.iter().map(|rule| &rule.rollout));
        for rollout in rollouts {
            if let Some(key) = rollout
                .referenced_keys()
                .find(|key| !self.variants.contains_key(*key))
            {
                return Err(ModelError::UnknownVariant {
                    variable: self.name.clone(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Field-wise union where `other`'s explicitly set fields win.
    ///
    /// Variants are unioned (other's entry wins per key); rollout and overrides
    /// are replaced only when `other` sets them; optional fields are replaced
    /// when `other` carries `Some`; aliases are unioned preserving order.
    pub(crate) fn merged_with(&self, other: &VariableConfig) -> VariableConfig {
        let mut variants = self.variants.clone();
        variants.extend(other.variants.clone());

        let mut aliases = self.aliases.clone();
        for alias in &other.aliases {
            if !aliases.contains(alias) {
                aliases.push(alias.clone());
            }
        }

        VariableConfig {
            name: self.name.clone(),
            variants,
            rollout: if other.rollout.is_empty() {
                self.rollout.clone()
            } else {
                other.rollout.clone()
            },
            overrides: if other.overrides.is_empty() {
                self.overrides.clone()
            } else {
                other.overrides.clone()
            },
            json_schema: other.json_schema.clone().or_else(|| self.json_schema.clone()),
            description: other.description.clone().or_else(|| self.description.clone()),
            aliases,
        }
    }
}

/// Builder for [`VariableConfig`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct VariableConfigBuilder {
    config: VariableConfig,
}

impl VariableConfigBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            config: VariableConfig {
                name: name.into(),
                variants: BTreeMap::new(),
                rollout: Rollout::empty(),
                overrides: Vec::new(),
                json_schema: None,
                description: None,
                aliases: Vec::new(),
            },
        }
    }

    /// Add or replace a variant.
    pub fn variant(mut self, variant: Variant) -> Self {
        self.config.variants.insert(variant.key.clone(), variant);
        self
    }

    /// Set the base rollout.
    pub fn rollout(mut self, rollout: Rollout) -> Self {
        self.config.rollout = rollout;
        self
    }

    /// Append an override; overrides are evaluated in insertion order.
    pub fn override_rule(mut self, rule: RolloutOverride) -> Self {
        self.config.overrides.push(rule);
        self
    }

    /// Set the JSON schema.
    pub fn json_schema(mut self, schema: Value) -> Self {
        self.config.json_schema = Some(schema);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.config.aliases.push(alias.into());
        self
    }

    /// Replace all aliases.
    pub fn aliases(mut self, aliases: impl IntoIterator<Item = String>) -> Self {
        self.config.aliases = aliases.into_iter().collect();
        self
    }

    /// Validate and produce the config.
    pub fn build(self) -> Result<VariableConfig, ModelError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

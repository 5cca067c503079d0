//! Weighted rollouts and conditional rollout overrides.
//!
//! Responsibilities:
//! - Hold a weighted distribution over variant keys plus the `latest` sentinel.
//! - Enforce the weight invariant at construction and on decode.
//! - Map a bucketing fraction in [0, 1) onto a rollout target.
//!
//! Does NOT handle:
//! - Computing the bucketing fraction (see the client crate hashing module).
//! - Checking that referenced keys exist (see `VariableConfig`).
//!
//! Invariants:
//! - Every weight is finite and within [0, 1].
//! - `sum(variants) + latest_weight <= 1.0` (within `WEIGHT_EPSILON`).
//! - Entries are walked in lexicographic key order, with `latest` last.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::condition::{Attributes, Condition};
use super::error::ModelError;
use crate::constants::{LATEST_VARIANT_KEY, WEIGHT_EPSILON};

/// What a rollout selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutTarget<'a> {
    /// A variant addressed by key.
    Named(&'a str),
    /// The highest-versioned variant.
    Latest,
}

/// A weighted distribution over variants.
///
/// Unallocated mass (`1 - total_weight`) means "no selection": the caller
/// falls back to its code default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RolloutWire", into = "RolloutWire")]
pub struct Rollout {
    variants: BTreeMap<String, f64>,
    latest_weight: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct RolloutWire {
    #[serde(default)]
    variants: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latest_weight: Option<f64>,
}

impl TryFrom<RolloutWire> for Rollout {
    type Error = ModelError;

    fn try_from(wire: RolloutWire) -> Result<Self, Self::Error> {
        Rollout::new(wire.variants, wire.latest_weight)
    }
}

impl From<Rollout> for RolloutWire {
    fn from(rollout: Rollout) -> Self {
        Self {
            variants: rollout.variants,
            latest_weight: rollout.latest_weight,
        }
    }
}

fn check_weight(key: &str, weight: f64) -> Result<(), ModelError> {
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(ModelError::InvalidWeight {
            key: key.to_string(),
            weight,
        })
    }
}

impl Rollout {
    /// Create a rollout, validating every weight and the total.
    pub fn new<K: Into<String>>(
        variants: impl IntoIterator<Item = (K, f64)>,
        latest_weight: Option<f64>,
    ) -> Result<Self, ModelError> {
        let variants: BTreeMap<String, f64> =
            variants.into_iter().map(|(k, w)| (k.into(), w)).collect();

        for (key, weight) in &variants {
            check_weight(key, *weight)?;
        }
        if let Some(weight) = latest_weight {
            check_weight(LATEST_VARIANT_KEY, weight)?;
        }

        let rollout = Self {
            variants,
            latest_weight,
        };
        let total = rollout.total_weight();
        if total > 1.0 + WEIGHT_EPSILON {
            return Err(ModelError::WeightsExceedOne { total });
        }
        Ok(rollout)
    }

    /// A rollout that always selects `key`.
    pub fn single(key: impl Into<String>) -> Self {
        Self {
            variants: BTreeMap::from([(key.into(), 1.0)]),
            latest_weight: None,
        }
    }

    /// A rollout that always selects the latest variant.
    pub fn latest() -> Self {
        Self {
            variants: BTreeMap::new(),
            latest_weight: Some(1.0),
        }
    }

    /// A rollout that never selects anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Weights by variant key.
    pub fn variants(&self) -> &BTreeMap<String, f64> {
        &self.variants
    }

    /// Weight routed to the latest variant through `latest_weight`.
    pub fn latest_weight(&self) -> Option<f64> {
        self.latest_weight
    }

    /// Whether the rollout carries any explicit allocation.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty() && self.latest_weight.is_none()
    }

    /// Sum of all allocated weight.
    pub fn total_weight(&self) -> f64 {
        self.variants.values().sum::<f64>() + self.latest_weight.unwrap_or(0.0)
    }

    /// Variant keys referenced by this rollout, excluding the `latest` sentinel.
    pub fn referenced_keys(&self) -> impl Iterator<Item = &str> {
        self.variants
            .keys()
            .map(String::as_str)
            .filter(|key| *key != LATEST_VARIANT_KEY)
    }

    /// Entries in walk order: named variants lexicographically, then `latest`.
    pub fn entries(&self) -> Vec<(RolloutTarget<'_>, f64)> {
        let mut entries: Vec<(RolloutTarget<'_>, f64)> = self
            .referenced_keys()
            .map(|key| (RolloutTarget::Named(key), self.variants[key]))
            .collect();

        let latest = self.variants.get(LATEST_VARIANT_KEY).copied().unwrap_or(0.0)
            + self.latest_weight.unwrap_or(0.0);
        if latest > 0.0 {
            entries.push((RolloutTarget::Latest, latest));
        }
        entries
    }

    /// Select the target whose cumulative range contains `fraction`.
    ///
    /// Returns `None` when `fraction` falls into unallocated mass.
    pub fn select(&self, fraction: f64) -> Option<RolloutTarget<'_>> {
        let mut cumulative = 0.0;
        for (target, weight) in self.entries() {
            cumulative += weight;
            if fraction < cumulative {
                return Some(target);
            }
        }
        None
    }
}

/// A conditional rule substituting a different rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutOverride {
    /// Conditions combined with AND semantics, evaluated in order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Rollout used when every condition holds.
    pub rollout: Rollout,
}

impl RolloutOverride {
    /// Create an override.
    pub fn new(conditions: impl IntoIterator<Item = Condition>, rollout: Rollout) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
            rollout,
        }
    }

    /// Whether every condition holds. An override without conditions always matches.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.conditions.iter().all(|c| c.evaluate(attributes))
    }
}

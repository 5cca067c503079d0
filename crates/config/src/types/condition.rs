//! Override conditions evaluated against caller attributes.
//!
//! Responsibilities:
//! - Define the closed set of condition kinds and their wire representation.
//! - Evaluate a condition against an attribute map.
//!
//! Does NOT handle:
//! - Combining conditions (see `RolloutOverride::matches`).
//! - Collecting ambient attributes (see the client crate resolver).
//!
//! Invariants:
//! - Regex patterns are compiled once, when the condition is built or decoded.
//! - Negative kinds hold when the attribute is absent.
//! - Regex kinds only match string attribute values.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::error::ModelError;

/// Attribute map supplied at resolution time.
pub type Attributes = BTreeMap<String, Value>;

/// A compiled regular expression that serializes as its source text.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile a pattern.
    pub fn new(source: &str) -> Result<Self, ModelError> {
        Regex::new(source)
            .map(Self)
            .map_err(|e| ModelError::InvalidPattern {
                pattern: source.to_string(),
                message: e.to_string(),
            })
    }

    /// The pattern source text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the pattern matches anywhere in `haystack`.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// The kinds of condition understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    ValueEquals,
    ValueDoesNotEqual,
    ValueIsIn,
    ValueIsNotIn,
    ValueMatchesRegex,
    ValueDoesNotMatchRegex,
    KeyIsPresent,
    KeyIsNotPresent,
}

impl ConditionKind {
    /// Every registered kind, in wire-name order of declaration.
    pub const ALL: [ConditionKind; 8] = [
        ConditionKind::ValueEquals,
        ConditionKind::ValueDoesNotEqual,
        ConditionKind::ValueIsIn,
        ConditionKind::ValueIsNotIn,
        ConditionKind::ValueMatchesRegex,
        ConditionKind::ValueDoesNotMatchRegex,
        ConditionKind::KeyIsPresent,
        ConditionKind::KeyIsNotPresent,
    ];

    /// Returns the wire `type` tag for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::ValueEquals => "ValueEquals",
            ConditionKind::ValueDoesNotEqual => "ValueDoesNotEqual",
            ConditionKind::ValueIsIn => "ValueIsIn",
            ConditionKind::ValueIsNotIn => "ValueIsNotIn",
            ConditionKind::ValueMatchesRegex => "ValueMatchesRegex",
            ConditionKind::ValueDoesNotMatchRegex => "ValueDoesNotMatchRegex",
            ConditionKind::KeyIsPresent => "KeyIsPresent",
            ConditionKind::KeyIsNotPresent => "KeyIsNotPresent",
        }
    }

    /// Look up a kind by its wire tag.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate over one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Condition {
    ValueEquals { attribute: String, value: Value },
    ValueDoesNotEqual { attribute: String, value: Value },
    ValueIsIn { attribute: String, values: Vec<Value> },
    ValueIsNotIn { attribute: String, values: Vec<Value> },
    ValueMatchesRegex { attribute: String, pattern: Pattern },
    ValueDoesNotMatchRegex { attribute: String, pattern: Pattern },
    KeyIsPresent { attribute: String },
    KeyIsNotPresent { attribute: String },
}

impl Condition {
    /// `attribute == value`.
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ValueEquals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// `attribute != value` (holds when the attribute is absent).
    pub fn not_equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ValueDoesNotEqual {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// `attribute` is one of `values`.
    pub fn is_in<V: Into<Value>>(
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::ValueIsIn {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `attribute` is none of `values`.
    pub fn is_not_in<V: Into<Value>>(
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::ValueIsNotIn {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `attribute` is a string matching `pattern`.
    pub fn matches_regex(attribute: impl Into<String>, pattern: &str) -> Result<Self, ModelError> {
        Ok(Self::ValueMatchesRegex {
            attribute: attribute.into(),
            pattern: Pattern::new(pattern)?,
        })
    }

    /// `attribute` is absent, not a string, or does not match `pattern`.
    pub fn does_not_match_regex(
        attribute: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, ModelError> {
        Ok(Self::ValueDoesNotMatchRegex {
            attribute: attribute.into(),
            pattern: Pattern::new(pattern)?,
        })
    }

    /// `attribute` is present with any value.
    pub fn key_present(attribute: impl Into<String>) -> Self {
        Self::KeyIsPresent {
            attribute: attribute.into(),
        }
    }

    /// `attribute` is absent.
    pub fn key_absent(attribute: impl Into<String>) -> Self {
        Self::KeyIsNotPresent {
            attribute: attribute.into(),
        }
    }

    /// The kind of this condition.
    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::ValueEquals { .. } => ConditionKind::ValueEquals,
            Condition::ValueDoesNotEqual { .. } => ConditionKind::ValueDoesNotEqual,
            Condition::ValueIsIn { .. } => ConditionKind::ValueIsIn,
            Condition::ValueIsNotIn { .. } => ConditionKind::ValueIsNotIn,
            Condition::ValueMatchesRegex { .. } => ConditionKind::ValueMatchesRegex,
            Condition::ValueDoesNotMatchRegex { .. } => ConditionKind::ValueDoesNotMatchRegex,
            Condition::KeyIsPresent { .. } => ConditionKind::KeyIsPresent,
            Condition::KeyIsNotPresent { .. } => ConditionKind::KeyIsNotPresent,
        }
    }

    /// The attribute name this condition inspects.
    pub fn attribute(&self) -> &str {
        match self {
            Condition::ValueEquals { attribute, .. }
            | Condition::ValueDoesNotEqual { attribute, .. }
            | Condition::ValueIsIn { attribute, .. }
            | Condition::ValueIsNotIn { attribute, .. }
            | Condition::ValueMatchesRegex { attribute, .. }
            | Condition::ValueDoesNotMatchRegex { attribute, .. }
            | Condition::KeyIsPresent { attribute }
            | Condition::KeyIsNotPresent { attribute } => attribute,
        }
    }

    /// Evaluate this condition against `attributes`.
    pub fn evaluate(&self, attributes: &Attributes) -> bool {
        let actual = attributes.get(self.attribute());
        match self {
            Condition::ValueEquals { value, .. } => actual == Some(value),
            Condition::ValueDoesNotEqual { value, .. } => actual != Some(value),
            Condition::ValueIsIn { values, .. } => actual.is_some_and(|a| values.contains(a)),
            Condition::ValueIsNotIn { values, .. } => !actual.is_some_and(|a| values.contains(a)),
            Condition::ValueMatchesRegex { pattern, .. } => {
                string_value(actual).is_some_and(|s| pattern.is_match(s))
            }
            Condition::ValueDoesNotMatchRegex { pattern, .. } => {
                !string_value(actual).is_some_and(|s| pattern.is_match(s))
            }
            Condition::KeyIsPresent { .. } => actual.is_some(),
            Condition::KeyIsNotPresent { .. } => actual.is_none(),
        }
    }
}

fn string_value(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

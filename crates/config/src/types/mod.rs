//! Variable configuration data model.
//!
//! Responsibilities:
//! - Define the immutable value objects: variants, conditions, rollouts,
//!   overrides, per-variable configs and the full variables document.
//! - Enforce weight and reference invariants at construction and on decode.
//! - Provide the JSON/YAML wire representation.
//!
//! Does NOT handle:
//! - Resolving a value for a caller (see the client crate resolver).
//! - Fetching, publishing or caching snapshots (see the client crate providers).
//!
//! Invariants:
//! - Values are never mutated in place; updates produce new values.
//! - Decoding a document runs the same validation as the builders.

mod condition;
mod error;
mod rollout;
mod variable;
mod variables;
mod variant;

pub use condition::{Attributes, Condition, ConditionKind, Pattern};
pub use error::{ModelError, Result};
pub use rollout::{Rollout, RolloutOverride, RolloutTarget};
pub use variable::{VariableConfig, VariableConfigBuilder};
pub use variables::VariablesConfig;
pub use variant::Variant;

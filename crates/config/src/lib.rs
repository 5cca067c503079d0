//! Configuration model for managed variables.
//!
//! This crate provides the immutable data model for named variables
//! (variants, rollouts, conditional overrides), its wire codecs, and the
//! engine settings loaded from environment variables.

pub mod constants;
mod loader;
pub mod settings;
pub mod types;

pub use loader::{ConfigError, SettingsLoader, env_var_or_none};
pub use settings::Settings;
pub use types::{
    Attributes, Condition, ConditionKind, ModelError, Pattern, Rollout, RolloutOverride,
    RolloutTarget, VariableConfig, VariableConfigBuilder, VariablesConfig, Variant,
};

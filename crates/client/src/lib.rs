//! Managed variables engine.
//!
//! This crate resolves named, typed variables at runtime from a versioned
//! configuration source. Values can be targeted per subject (deterministic
//! hashing), rolled out by weight, overridden by attribute conditions and
//! forced per execution context, with the code default as the final fallback.
//!
//! Configuration comes from a `Provider`: `LocalProvider` holds an in-memory
//! declaration, `RemoteProvider` polls a `ConfigBackend` in the background.
//! Both publish immutable snapshots and notify change subscribers.

pub mod admin;
pub mod backend;
pub mod error;
pub mod local;
pub mod logging;
pub mod metrics;
pub mod notifier;
pub mod overrides;
pub mod provider;
pub mod registry;
pub mod remote;
pub mod resolver;
pub mod store;
pub mod telemetry;
pub mod variable;

pub use admin::{
    PushOptions, PushOutcome, PushPlan, PushReport, SchemaCheck, TypeSchemaCheck,
    ValidationReport,
};
pub use backend::{ConfigBackend, FnBackend, HttpBackend};
pub use error::{Result, VariablesError};
pub use local::LocalProvider;
pub use notifier::ChangeCallback;
pub use overrides::OverrideGuard;
pub use provider::Provider;
pub use registry::{Registry, RegistryOptions, VariableBuilder};
pub use remote::{ProviderState, RemoteOptions, RemoteProvider};
pub use resolver::{
    ContextOptions, JsonValidator, ResolutionResult, ResolutionSource, Validate,
};
pub use store::Snapshot;
pub use telemetry::{NoopResolveHook, ResolveHook, TracingResolveHook};
pub use variable::{CodeDefault, Resolved, Variable};

pub use variables_config::{
    Attributes, Condition, Rollout, RolloutOverride, Settings, SettingsLoader, VariableConfig,
    VariablesConfig, Variant,
};

//! Variable resolution.
//!
//! Responsibilities:
//! - Pick the rollout (first matching override, else the base rollout).
//! - Bucket the effective targeting key into that rollout.
//! - Validate the selected variant and fall back to the code default on failure.
//!
//! Does NOT handle:
//! - Context overrides (see `overrides`) or snapshot lookup (see `provider`).
//! - Logging, metrics or telemetry hooks; the caller reports outcomes.
//!
//! Invariants:
//! - Resolution only reads immutable inputs and never takes a lock.
//! - For a fixed config and targeting key the selected variant is stable.
//! - Resolution never fails: errors are carried in `ResolutionResult::error`.

mod context;
mod hashing;
mod validate;

use std::fmt;

use variables_config::{Attributes, VariableConfig, Variant};

use crate::error::VariablesError;

pub use context::{ContextOptions, ambient_targeting_key, merged_attributes};
pub use hashing::bucket_fraction;
pub use validate::{JsonValidator, Validate};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionSource {
    /// A scoped override on the current execution context.
    ContextOverride,
    /// A variant selected from the provider's snapshot.
    Variant,
    /// The code default.
    Default,
}

impl ResolutionSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::ContextOverride => "context_override",
            ResolutionSource::Variant => "variant",
            ResolutionSource::Default => "default",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one variable.
#[derive(Debug)]
pub struct ResolutionResult<T> {
    pub value: T,
    pub variant: Option<String>,
    pub version: Option<u32>,
    pub error: Option<VariablesError>,
    pub source: ResolutionSource,
}

impl<T> ResolutionResult<T> {
    /// A code-default result, optionally recording why.
    pub fn default_value(value: T, error: Option<VariablesError>) -> Self {
        Self {
            value,
            variant: None,
            version: None,
            error,
            source: ResolutionSource::Default,
        }
    }

    pub fn context_override(value: T) -> Self {
        Self {
            value,
            variant: None,
            version: None,
            error: None,
            source: ResolutionSource::ContextOverride,
        }
    }

    /// Transform the value, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResolutionResult<U> {
        ResolutionResult {
            value: f(self.value),
            variant: self.variant,
            version: self.version,
            error: self.error,
            source: self.source,
        }
    }
}

/// Select a variant for already-merged attributes and an effective key.
///
/// Returns `None` when the key buckets into unallocated weight, or when the
/// rollout routes to `latest` and no variant is versioned.
pub fn select_variant<'c>(
    config: &'c VariableConfig,
    targeting_key: &str,
    attributes: &Attributes,
) -> Option<&'c Variant> {
    let rollout = config.matching_rollout(attributes);
    let fraction = bucket_fraction(config.name(), targeting_key);
    rollout
        .select(fraction)
        .and_then(|target| config.variant_for(target))
}

/// Resolve `config` for a calling context.
///
/// `default` is only invoked when no validated variant is selected.
pub fn resolve<T>(
    config: &VariableConfig,
    targeting_key: Option<&str>,
    attributes: &Attributes,
    options: ContextOptions,
    validator: &dyn Validate<T>,
    default: impl FnOnce() -> T,
) -> ResolutionResult<T> {
    let attributes = merged_attributes(attributes, options);
    let ambient_key;
    let key = match targeting_key {
        Some(key) => key,
        None => {
            ambient_key = ambient_targeting_key();
            ambient_key.as_str()
        }
    };

    let Some(variant) = select_variant(config, key, &attributes) else {
        return ResolutionResult::default_value(default(), None);
    };

    match validator.validate(&variant.serialized_value) {
        Ok(value) => ResolutionResult {
            value,
            variant: Some(variant.key.clone()),
            version: variant.version,
            error: None,
            source: ResolutionSource::Variant,
        },
        Err(message) => ResolutionResult::default_value(
            default(),
            Some(VariablesError::SchemaValidation {
                variable: config.name().to_string(),
                message: format!("variant '{}': {}", variant.key, message),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use variables_config::{Condition, Rollout, RolloutOverride};

    fn flag() -> VariableConfig {
        VariableConfig::builder("flag")
            .variant(Variant::new("on", "true"))
            .variant(Variant::new("off", "false"))
            .rollout(Rollout::new([("on", 0.3), ("off", 0.7)], None).unwrap())
            .build()
            .unwrap()
    }

    fn resolve_flag(config: &VariableConfig, key: &str, attributes: &Attributes) -> ResolutionResult<bool> {
        resolve(
            config,
            Some(key),
            attributes,
            ContextOptions::caller_only(),
            &JsonValidator::<bool>::new(),
            || false,
        )
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config = flag();
        let first = resolve_flag(&config, "user-42", &Attributes::new());
        let second = resolve_flag(&config, "user-42", &Attributes::new());
        assert_eq!(first.variant, second.variant);
        assert_eq!(first.source, ResolutionSource::Variant);
        // "off" covers [0, 0.7) and user-42 buckets at ~0.419.
        assert_eq!(first.variant.as_deref(), Some("off"));
        assert!(!first.value);
    }

    #[test]
    fn test_unallocated_weight_uses_default() {
        let config = VariableConfig::builder("greeting")
            .variant(Variant::new("formal", "\"Good day\""))
            .rollout(Rollout::new([("formal", 0.01)], None).unwrap())
            .build()
            .unwrap();
        // "greeting:user-7" buckets at ~0.31.
        let result = resolve(
            &config,
            Some("user-7"),
            &Attributes::new(),
            ContextOptions::caller_only(),
            &JsonValidator::<String>::new(),
            || "hello".to_string(),
        );
        assert_eq!(result.value, "hello");
        assert_eq!(result.source, ResolutionSource::Default);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_first_matching_override_wins() {
        let config = VariableConfig::builder("flag")
            .variant(Variant::new("on", "true"))
            .variant(Variant::new("off", "false"))
            .rollout(Rollout::single("off"))
            .override_rule(RolloutOverride::new(
                [Condition::equals("plan", "enterprise")],
                Rollout::single("on"),
            ))
            .override_rule(RolloutOverride::new([], Rollout::single("off")))
            .build()
            .unwrap();

        let enterprise = Attributes::from([("plan".to_string(), json!("enterprise"))]);
        for i in 0..50 {
            let result = resolve_flag(&config, &format!("user-{i}"), &enterprise);
            assert_eq!(result.variant.as_deref(), Some("on"));
        }

        let free = Attributes::from([("plan".to_string(), json!("free"))]);
        assert_eq!(
            resolve_flag(&config, "user-1", &free).variant.as_deref(),
            Some("off")
        );
    }

    #[test]
    fn test_validation_failure_degrades_to_default() {
        let config = VariableConfig::builder("flag")
            .variant(Variant::new("broken", "\"not a bool\""))
            .rollout(Rollout::single("broken"))
            .build()
            .unwrap();

        let result = resolve_flag(&config, "user-1", &Attributes::new());
        assert!(!result.value);
        assert_eq!(result.source, ResolutionSource::Default);
        assert!(matches!(
            result.error,
            Some(VariablesError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_latest_routes_to_highest_version() {
        let config = VariableConfig::builder("prompt")
            .variant(Variant::new("v1", "\"first\"").with_version(1))
            .variant(Variant::new("v2", "\"second\"").with_version(2))
            .rollout(Rollout::latest())
            .build()
            .unwrap();

        let result = resolve(
            &config,
            Some("anyone"),
            &Attributes::new(),
            ContextOptions::caller_only(),
            &JsonValidator::<String>::new(),
            String::new,
        );
        assert_eq!(result.value, "second");
        assert_eq!(result.version, Some(2));
    }

    #[test]
    fn test_missing_key_uses_ambient_fallback() {
        let config = VariableConfig::builder("flag")
            .variant(Variant::new("on", "true"))
            .rollout(Rollout::single("on"))
            .build()
            .unwrap();
        let result = resolve(
            &config,
            None,
            &Attributes::new(),
            ContextOptions::caller_only(),
            &JsonValidator::<bool>::new(),
            || false,
        );
        assert!(result.value);
    }

    #[test]
    fn test_default_supplier_not_called_on_success() {
        let config = flag();
        let result = resolve(
            &config,
            Some("user-42"),
            &Attributes::new(),
            ContextOptions::caller_only(),
            &JsonValidator::<bool>::new(),
            || panic!("default should not be computed"),
        );
        assert_eq!(result.source, ResolutionSource::Variant);
    }
}

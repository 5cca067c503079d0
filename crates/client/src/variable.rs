//! The variable handle applications hold.
//!
//! Responsibilities:
//! - Resolve a value: context override, then provider snapshot, then code default.
//! - Publish a "variable resolved" baggage annotation for as long as the
//!   resolved value is held.
//! - Expose scoped overrides, change subscriptions and refreshes.
//!
//! Does NOT handle:
//! - Registration and name uniqueness (see `registry`).
//!
//! Invariants:
//! - `get` and `get_details` never fail and never block on I/O.
//! - The baggage annotation is removed when `Resolved` drops, on every path.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use opentelemetry::ContextGuard;
use serde_json::Value;
use tracing::debug;
use variables_config::Attributes;

use crate::error::{Result, VariablesError};
use crate::metrics;
use crate::overrides::{self, OverrideGuard, OverrideValue};
use crate::provider::Provider;
use crate::resolver::{self, ContextOptions, ResolutionResult, ResolutionSource, Validate};
use crate::telemetry::{self, ResolveHook};

/// Value used when nothing else applies.
pub enum CodeDefault<T> {
    Value(T),
    Supplier(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> CodeDefault<T> {
    pub fn get(&self) -> T {
        match self {
            CodeDefault::Value(value) => value.clone(),
            CodeDefault::Supplier(supply) => supply(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CodeDefault<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            CodeDefault::Supplier(_) => f.write_str("Supplier"),
        }
    }
}

pub(crate) struct VariableParts<T> {
    pub name: String,
    pub description: Option<String>,
    pub json_schema: Option<Value>,
    pub default: CodeDefault<T>,
    pub validator: Arc<dyn Validate<T>>,
    pub provider: Arc<dyn Provider>,
    pub hook: Arc<dyn ResolveHook>,
    pub context: ContextOptions,
}

struct Inner<T> {
    id: u64,
    parts: VariableParts<T>,
}

/// Handle bound to one variable name, code default and value type.
///
/// Cheap to clone; clones share overrides and subscriptions.
pub struct Variable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.inner.parts.name)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Variable<T> {
    pub(crate) fn new(parts: VariableParts<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: overrides::next_id(),
                parts,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.parts.name
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.parts.description.as_deref()
    }

    pub fn json_schema(&self) -> Option<&Value> {
        self.inner.parts.json_schema.as_ref()
    }

    /// The code default, evaluated now.
    pub fn default_value(&self) -> T {
        self.inner.parts.default.get()
    }

    /// Resolve with an ambient targeting key and no caller attributes.
    pub fn get(&self) -> Resolved<T> {
        self.get_for(None, &Attributes::new())
    }

    /// Resolve for a subject and its attributes.
    pub fn get_for(&self, targeting_key: Option<&str>, attributes: &Attributes) -> Resolved<T> {
        let result = self.get_details_for(targeting_key, attributes);
        let annotation = telemetry::annotation_value(result.variant.as_deref(), result.source);
        Resolved {
            _baggage: telemetry::annotate(self.name(), annotation),
            value: result.value,
            variant: result.variant,
            source: result.source,
        }
    }

    /// Resolve and return the full outcome, including any error.
    pub fn get_details(&self) -> ResolutionResult<T> {
        self.get_details_for(None, &Attributes::new())
    }

    pub fn get_details_for(
        &self,
        targeting_key: Option<&str>,
        attributes: &Attributes,
    ) -> ResolutionResult<T> {
        let parts = &self.inner.parts;

        let result = if let Some(active) = overrides::top::<T>(self.inner.id) {
            ResolutionResult::context_override(active.evaluate(targeting_key, attributes))
        } else {
            match parts.provider.current_snapshot(&parts.name) {
                Some(config) => resolver::resolve(
                    &config,
                    targeting_key,
                    attributes,
                    parts.context,
                    parts.validator.as_ref(),
                    || parts.default.get(),
                ),
                None => ResolutionResult::default_value(
                    parts.default.get(),
                    Some(VariablesError::NotFound(parts.name.clone())),
                ),
            }
        };

        if let Some(error) = &result.error {
            debug!(variable = %parts.name, error = %error, "Using code default");
        }
        metrics::record_resolution(result.source);
        parts
            .hook
            .on_resolve(&parts.name, result.variant.as_deref(), result.version);
        result
    }

    /// Force `value` for this execution context until the guard drops.
    pub fn override_value(&self, value: T) -> OverrideGuard {
        overrides::push(self.inner.id, OverrideValue::Fixed(value))
    }

    /// Compute the value from `(targeting_key, attributes)` until the guard drops.
    pub fn override_with(
        &self,
        compute: impl Fn(Option<&str>, &Attributes) -> T + Send + Sync + 'static,
    ) -> OverrideGuard {
        overrides::push(self.inner.id, OverrideValue::Computed(Arc::new(compute)))
    }

    /// Call `callback` whenever this variable's snapshot is swapped.
    pub fn on_change(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.inner
            .parts
            .provider
            .on_change(&self.inner.parts.name, Arc::new(callback));
    }

    /// Refresh the provider without blocking the executor thread.
    pub async fn refresh(&self, force: bool) -> Result<()> {
        self.inner
            .parts
            .provider
            .force_refresh_async(Some(self.name()), force)
            .await
    }

    /// Refresh the provider, blocking until done or timed out.
    pub fn refresh_sync(&self, force: bool) -> Result<()> {
        self.inner.parts.provider.force_refresh(Some(self.name()), force)
    }
}

/// A resolved value with its baggage annotation attached.
///
/// Not `Send`: the annotation belongs to the current thread's context.
pub struct Resolved<T> {
    value: T,
    variant: Option<String>,
    source: ResolutionSource,
    _baggage: ContextGuard,
}

impl<T> Resolved<T> {
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn source(&self) -> ResolutionSource {
        self.source
    }

    /// Take the value, detaching the annotation.
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> Deref for Resolved<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("value", &self.value)
            .field("variant", &self.variant)
            .field("source", &self.source)
            .finish()
    }
}

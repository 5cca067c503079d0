//! Registry of variable handles bound to one provider.
//!
//! Responsibilities:
//! - Create `Variable` handles, rejecting duplicate names.
//! - Export declared metadata for pushing to a backend.
//! - Own the provider lifecycle (`refresh_all`, `shutdown`).
//!
//! Does NOT handle:
//! - Resolution itself (see `variable` and `resolver`).
//!
//! Invariants:
//! - A name is registered at most once per registry.
//! - Registries are plain values; nothing is process-global.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use variables_config::{Settings, VariableConfig, VariablesConfig};

use crate::error::{Result, VariablesError};
use crate::local::LocalProvider;
use crate::provider::Provider;
use crate::resolver::{ContextOptions, JsonValidator, Validate};
use crate::telemetry::{ResolveHook, TracingResolveHook};
use crate::variable::{CodeDefault, Variable, VariableParts};

/// Behavior shared by every handle a registry creates.
#[derive(Clone)]
pub struct RegistryOptions {
    pub context: ContextOptions,
    pub hook: Arc<dyn ResolveHook>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            context: ContextOptions::default(),
            hook: Arc::new(TracingResolveHook),
        }
    }
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("context", &self.context)
            .finish()
    }
}

impl RegistryOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            context: ContextOptions::from_settings(settings),
            ..Self::default()
        }
    }

    /// Builder method to set the resolve hook.
    pub fn with_hook(mut self, hook: Arc<dyn ResolveHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Builder method to set the ambient attribute sources.
    pub fn with_context(mut self, context: ContextOptions) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone)]
struct Declaration {
    description: Option<String>,
    json_schema: Option<Value>,
}

/// Collection of variable handles sharing one provider.
pub struct Registry {
    provider: Arc<dyn Provider>,
    options: RegistryOptions,
    declared: Mutex<BTreeMap<String, Declaration>>,
    closed: AtomicBool,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("variables", &self.names())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Registry {
    pub fn new(provider: Arc<dyn Provider>, options: RegistryOptions) -> Self {
        Self {
            provider,
            options,
            declared: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Registry over an in-memory declaration with default options.
    pub fn local(config: VariablesConfig) -> Self {
        Self::new(
            Arc::new(LocalProvider::new(config)),
            RegistryOptions::default(),
        )
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Declare a variable whose served values decode as JSON into `T`.
    pub fn variable<T>(&self, name: impl Into<String>, default: T) -> VariableBuilder<'_, T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.variable_validated(name, default, JsonValidator::<T>::new())
    }

    /// Declare a variable with a custom validator.
    pub fn variable_validated<T>(
        &self,
        name: impl Into<String>,
        default: T,
        validator: impl Validate<T> + 'static,
    ) -> VariableBuilder<'_, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        VariableBuilder {
            registry: self,
            name: name.into(),
            description: None,
            json_schema: None,
            default: CodeDefault::Value(default),
            validator: Arc::new(validator),
        }
    }

    /// Names of every registered variable, sorted.
    pub fn names(&self) -> Vec<String> {
        self.declared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Declared metadata (name, description, schema) of every variable.
    ///
    /// Code defaults are not exported.
    pub fn to_variables_config(&self) -> Result<VariablesConfig> {
        let declared = self
            .declared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let configs = declared
            .into_iter()
            .map(|(name, declaration)| {
                let mut builder = VariableConfig::builder(name);
                if let Some(description) = declaration.description {
                    builder = builder.description(description);
                }
                if let Some(schema) = declaration.json_schema {
                    builder = builder.json_schema(schema);
                }
                builder.build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(VariablesConfig::from_variables(configs)?)
    }

    /// Refresh the provider without blocking the executor thread.
    pub async fn refresh_all(&self, force: bool) -> Result<()> {
        self.provider.force_refresh_async(None, force).await
    }

    /// Refresh the provider, blocking until done or timed out.
    pub fn refresh_all_sync(&self, force: bool) -> Result<()> {
        self.provider.force_refresh(None, force)
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the provider. Handles keep serving the last snapshot. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.provider.close();
        info!(variables = self.names().len(), "Variables registry shut down");
    }

    fn register<T: Clone + Send + Sync + 'static>(
        &self,
        builder: VariableBuilder<'_, T>,
    ) -> Result<Variable<T>> {
        let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);
        if declared.contains_key(&builder.name) {
            return Err(VariablesError::DuplicateVariable(builder.name));
        }
        declared.insert(
            builder.name.clone(),
            Declaration {
                description: builder.description.clone(),
                json_schema: builder.json_schema.clone(),
            },
        );
        drop(declared);

        debug!(variable = %builder.name, "Registered variable");
        Ok(Variable::new(VariableParts {
            name: builder.name,
            description: builder.description,
            json_schema: builder.json_schema,
            default: builder.default,
            validator: builder.validator,
            provider: Arc::clone(&self.provider),
            hook: Arc::clone(&self.options.hook),
            context: self.options.context,
        }))
    }
}

/// Builder returned by `Registry::variable`.
#[must_use = "call build() to register the variable"]
pub struct VariableBuilder<'r, T> {
    registry: &'r Registry,
    name: String,
    description: Option<String>,
    json_schema: Option<Value>,
    default: CodeDefault<T>,
    validator: Arc<dyn Validate<T>>,
}

impl<T: Clone + Send + Sync + 'static> VariableBuilder<'_, T> {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn json_schema(mut self, schema: Value) -> Self {
        self.json_schema = Some(schema);
        self
    }

    /// Compute the default on every fallback instead of cloning a fixed value.
    pub fn default_with(mut self, supplier: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.default = CodeDefault::Supplier(Arc::new(supplier));
        self
    }

    pub fn validator(mut self, validator: impl Validate<T> + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Register the variable.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateVariable` if the name is already registered.
    pub fn build(self) -> Result<Variable<T>> {
        self.registry.register(self)
    }
}

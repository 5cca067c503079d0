//! In-process provider backed by a caller-supplied declaration.
//!
//! Responsibilities:
//! - Serve a `VariablesConfig` handed over at construction.
//! - Create, update and delete variables at runtime, notifying subscribers.
//!
//! Does NOT handle:
//! - Polling or any I/O.
//!
//! Invariants:
//! - Callbacks run synchronously on the mutating thread, after the swap.
//! - The store lock is released before any callback runs.

use std::sync::Arc;

use futures::future::{self, BoxFuture};
use tracing::debug;
use variables_config::{VariableConfig, VariablesConfig};

use crate::error::{Result, VariablesError};
use crate::notifier::ChangeCallback;
use crate::provider::{Provider, ProviderCore};
use crate::store::Snapshot;

/// Provider serving an in-memory declaration.
#[derive(Debug, Default)]
pub struct LocalProvider {
    core: ProviderCore,
}

impl LocalProvider {
    pub fn new(config: VariablesConfig) -> Self {
        Self {
            core: ProviderCore::new(&config),
        }
    }

    /// Add a variable that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateVariable` if the name is already present.
    pub fn create_variable(&self, config: VariableConfig) -> Result<()> {
        if self.core.store().load().get(config.name()).is_some() {
            return Err(VariablesError::DuplicateVariable(config.name().to_string()));
        }
        debug!(variable = %config.name(), "Creating variable");
        let publication = self.core.store().upsert(config);
        self.core.announce(&publication);
        Ok(())
    }

    /// Replace an existing variable. Unchanged configs fire no callbacks.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the name is unknown.
    pub fn update_variable(&self, config: VariableConfig) -> Result<()> {
        if self.core.store().load().get(config.name()).is_none() {
            return Err(VariablesError::NotFound(config.name().to_string()));
        }
        debug!(variable = %config.name(), "Updating variable");
        let publication = self.core.store().upsert(config);
        self.core.announce(&publication);
        Ok(())
    }

    /// Remove a variable. Later resolutions fall back to code defaults.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the name is unknown.
    pub fn delete_variable(&self, name: &str) -> Result<()> {
        let publication = self.core.store().remove(name);
        if !self.core.announce(&publication) {
            return Err(VariablesError::NotFound(name.to_string()));
        }
        debug!(variable = %name, "Deleted variable");
        Ok(())
    }

    /// Replace the whole declaration, notifying every changed name.
    pub fn replace_all(&self, config: &VariablesConfig) {
        let publication = self.core.store().replace_all(config);
        self.core.announce(&publication);
    }
}

impl Provider for LocalProvider {
    fn current_snapshot(&self, name: &str) -> Option<Arc<VariableConfig>> {
        self.core.store().get(name)
    }

    fn resolve_alias(&self, name: &str) -> Option<String> {
        self.core.store().resolve_alias(name)
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.core.store().load()
    }

    fn force_refresh(&self, _name: Option<&str>, _force: bool) -> Result<()> {
        Ok(())
    }

    fn force_refresh_async(
        &self,
        _name: Option<&str>,
        _force: bool,
    ) -> BoxFuture<'static, Result<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn on_change(&self, name: &str, callback: ChangeCallback) {
        self.core.notifier().register(name, callback);
    }

    fn close(&self) {
        self.core.notifier().clear();
    }
}

//! Provider abstraction over configuration sources.
//!
//! Responsibilities:
//! - Define the capability set every configuration source exposes.
//! - Share snapshot publication and notification between implementations.
//!
//! Does NOT handle:
//! - Resolution (see `resolver`) or scoped overrides (see `overrides`).
//!
//! Invariants:
//! - `current_snapshot` never blocks on I/O and never takes a lock held across I/O.
//! - Callbacks run after the new snapshot is visible to readers.

use std::sync::Arc;

use futures::future::BoxFuture;
use variables_config::{VariableConfig, VariablesConfig};

use crate::error::Result;
use crate::notifier::{ChangeCallback, ChangeNotifier};
use crate::store::{Publication, Snapshot, SnapshotStore};

/// A pluggable source of variable configuration snapshots.
pub trait Provider: Send + Sync {
    /// Config currently published for `name` (or an alias of it).
    fn current_snapshot(&self, name: &str) -> Option<Arc<VariableConfig>>;

    /// Canonical name behind `name` if it is a known alias.
    fn resolve_alias(&self, name: &str) -> Option<String>;

    /// Every variable currently published.
    fn snapshot(&self) -> Arc<Snapshot>;

    /// Refresh now, blocking the calling thread until done or timed out.
    ///
    /// `name` is the variable that asked, when there is one. With `force` set
    /// the refresh bypasses the polling interval.
    fn force_refresh(&self, name: Option<&str>, force: bool) -> Result<()>;

    /// Refresh now without blocking the executor thread.
    fn force_refresh_async(&self, name: Option<&str>, force: bool) -> BoxFuture<'static, Result<()>>;

    /// Register a zero-argument callback fired whenever `name` is swapped.
    fn on_change(&self, name: &str, callback: ChangeCallback);

    /// Release background resources. Idempotent.
    fn close(&self);
}

/// Snapshot store plus change notifier, shared by provider implementations.
#[derive(Debug, Default)]
pub(crate) struct ProviderCore {
    store: SnapshotStore,
    notifier: ChangeNotifier,
}

impl ProviderCore {
    pub(crate) fn new(initial: &VariablesConfig) -> Self {
        Self {
            store: SnapshotStore::from_config(initial),
            notifier: ChangeNotifier::new(),
        }
    }

    pub(crate) fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub(crate) fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Fire callbacks for everything a publication changed.
    pub(crate) fn announce(&self, publication: &Publication) -> bool {
        if publication.is_changed() {
            self.notifier.notify_publication(publication);
            true
        } else {
            false
        }
    }
}

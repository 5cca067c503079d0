//! Per-variable change callbacks.
//!
//! Responsibilities:
//! - Store callbacks per variable name in registration order.
//! - Invoke them after a snapshot swap, isolating panics.
//!
//! Does NOT handle:
//! - Deciding which names changed (see `store::SnapshotStore`).
//!
//! Invariants:
//! - The callback list lock is held only to append or copy; never while a
//!   callback runs.
//! - A panicking callback is logged and counted; remaining callbacks still run.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::error;

use crate::metrics;
use crate::store::{Publication, Snapshot};

/// A zero-argument change callback.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct ChangeNotifier {
    callbacks: RwLock<HashMap<String, Vec<ChangeCallback>>>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks = self.callbacks.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ChangeNotifier")
            .field("names", &callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `name`.
    pub fn register(&self, name: &str, callback: ChangeCallback) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .push(callback);
    }

    /// Number of callbacks registered for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Invoke every callback for `name`. Returns how many completed without panicking.
    pub fn notify(&self, name: &str) -> usize {
        let callbacks: Vec<ChangeCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default();

        let mut completed = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    metrics::record_callback_panic();
                    error!(
                        variable = %name,
                        panic = %panic_message(payload.as_ref()),
                        "Change callback panicked"
                    );
                }
            }
        }
        completed
    }

    /// Notify each changed name plus every alias that pointed at it before or after the swap.
    pub fn notify_publication(&self, publication: &Publication) {
        for name in names_to_notify(&publication.changed, &publication.before, &publication.after) {
            self.notify(&name);
        }
    }

    pub fn clear(&self) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn names_to_notify(changed: &[String], before: &Snapshot, after: &Snapshot) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in changed {
        let aliases = before.aliases_of(name).into_iter().chain(after.aliases_of(name));
        for candidate in std::iter::once(name.clone()).chain(aliases) {
            if !names.contains(&candidate) {
                names.push(candidate);
            }
        }
    }
    names
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Atomically published variable snapshots and the alias index.
//!
//! Responsibilities:
//! - Hold the current set of `VariableConfig`s behind a single atomic pointer.
//! - Rebuild the alias index on every publication.
//! - Report which names changed so providers can notify subscribers.
//!
//! Does NOT handle:
//! - Invoking change callbacks (see `notifier`).
//! - Fetching configuration (see `remote` and `backend`).
//!
//! Invariants:
//! - A new `Snapshot` is built fully before it is published; readers never
//!   observe a partial update and never take a lock.
//! - Writers serialize on a mutex held only while building and storing.
//! - Direct names take precedence over aliases.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::{debug, warn};
use variables_config::{VariableConfig, VariablesConfig};

use crate::metrics;

/// Immutable point-in-time view of every known variable.
#[derive(Debug, Default)]
pub struct Snapshot {
    variables: HashMap<String, Arc<VariableConfig>>,
    aliases: HashMap<String, String>,
}

impl Snapshot {
    fn new(variables: HashMap<String, Arc<VariableConfig>>) -> Self {
        let aliases = build_alias_index(&variables);
        Self { variables, aliases }
    }

    /// Config registered directly under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<VariableConfig>> {
        self.variables.get(name)
    }

    /// Canonical name for `name`: itself if known, else its alias target.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.variables.contains_key(name) {
            Some(name)
        } else {
            self.aliases.get(name).map(String::as_str)
        }
    }

    /// Config for `name`, consulting the alias index when it is not a direct name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<VariableConfig>> {
        self.canonical_name(name)
            .and_then(|canonical| self.variables.get(canonical))
    }

    /// Names of every alias pointing at `canonical`.
    pub fn aliases_of(&self, canonical: &str) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, target)| target.as_str() == canonical)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Export as a model document.
    pub fn to_variables_config(&self) -> VariablesConfig {
        VariablesConfig {
            variables: self
                .variables
                .iter()
                .map(|(name, config)| (name.clone(), config.as_ref().clone()))
                .collect(),
        }
    }
}

fn build_alias_index(variables: &HashMap<String, Arc<VariableConfig>>) -> HashMap<String, String> {
    let mut names: Vec<&String> = variables.keys().collect();
    names.sort();

    let mut index = HashMap::new();
    for name in names {
        for alias in variables[name].aliases() {
            if variables.contains_key(alias) {
                warn!(alias = %alias, variable = %name, "Alias shadows a variable name; ignoring alias");
                continue;
            }
            if let Some(existing) = index.get(alias) {
                warn!(alias = %alias, kept = %existing, ignored = %name, "Alias claimed by several variables");
                continue;
            }
            index.insert(alias.clone(), name.clone());
        }
    }
    index
}

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl SnapshotStore {
    pub fn empty() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &VariablesConfig) -> Self {
        let store = Self::empty();
        store.replace_all(config);
        store
    }

    /// The current snapshot. Cheap; never blocks writers.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Config for `name` or one of its aliases.
    pub fn get(&self, name: &str) -> Option<Arc<VariableConfig>> {
        self.current.load().lookup(name).cloned()
    }

    /// Canonical name behind an alias, if `name` is a known alias.
    pub fn resolve_alias(&self, name: &str) -> Option<String> {
        let snapshot = self.current.load();
        snapshot.aliases.get(name).cloned()
    }

    /// Insert or replace one variable.
    pub fn upsert(&self, config: VariableConfig) -> Publication {
        self.mutate(|variables| {
            let name = config.name().to_string();
            if variables.get(&name).is_some_and(|old| **old == config) {
                return Vec::new();
            }
            variables.insert(name.clone(), Arc::new(config));
            vec![name]
        })
    }

    /// Remove one variable.
    pub fn remove(&self, name: &str) -> Publication {
        self.mutate(|variables| match variables.remove(name) {
            Some(_) => vec![name.to_string()],
            None => Vec::new(),
        })
    }

    /// Replace every variable. Added, changed and removed names are reported.
    pub fn replace_all(&self, config: &VariablesConfig) -> Publication {
        self.mutate(|variables| {
            let mut changed = Vec::new();
            let next: HashMap<String, Arc<VariableConfig>> = config
                .variables
                .iter()
                .map(|(name, new)| {
                    let reused = variables.get(name).filter(|old| ***old == *new);
                    let entry = match reused {
                        Some(old) => Arc::clone(old),
                        None => {
                            changed.push(name.clone());
                            Arc::new(new.clone())
                        }
                    };
                    (name.clone(), entry)
                })
                .collect();
            changed.extend(
                variables
                    .keys()
                    .filter(|name| !next.contains_key(*name))
                    .cloned(),
            );
            *variables = next;
            changed.sort();
            changed
        })
    }

    fn mutate(
        &self,
        edit: impl FnOnce(&mut HashMap<String, Arc<VariableConfig>>) -> Vec<String>,
    ) -> Publication {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let before = self.current.load_full();
        let mut variables = before.variables.clone();
        let changed = edit(&mut variables);
        if changed.is_empty() {
            return Publication {
                after: Arc::clone(&before),
                before,
                changed,
            };
        }

        let after = Arc::new(Snapshot::new(variables));
        self.current.store(Arc::clone(&after));
        metrics::record_snapshot_swap();
        debug!(changed = ?changed, "Published new variables snapshot");
        Publication {
            changed,
            before,
            after,
        }
    }
}

/// Result of one store mutation.
#[derive(Debug)]
pub struct Publication {
    /// Names added, replaced or removed, sorted.
    pub changed: Vec<String>,
    pub before: Arc<Snapshot>,
    pub after: Arc<Snapshot>,
}

impl Publication {
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

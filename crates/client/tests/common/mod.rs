//! Common test utilities for integration tests.
//!
//! Fixtures are built in code; every helper returns fresh values so tests
//! never share provider state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[allow(unused_imports)]
pub use serde_json::json;
#[allow(unused_imports)]
pub use variables_client::{
    Attributes, Condition, LocalProvider, Provider, Registry, ResolutionSource, Rollout,
    RolloutOverride, VariableConfig, VariablesConfig, VariablesError, Variant,
};

/// `flag`: `on`=true with weight 0.3, `off`=false with weight 0.7.
#[allow(dead_code)]
pub fn flag_config() -> VariableConfig {
    VariableConfig::builder("flag")
        .variant(Variant::new("on", "true"))
        .variant(Variant::new("off", "false"))
        .rollout(Rollout::new([("on", 0.3), ("off", 0.7)], None).expect("valid rollout"))
        .build()
        .expect("valid flag config")
}

/// Two-way split between `a` and `b` under `name`.
#[allow(dead_code)]
pub fn split_config(name: &str) -> VariableConfig {
    VariableConfig::builder(name)
        .variant(Variant::new("a", "\"A\""))
        .variant(Variant::new("b", "\"B\""))
        .rollout(Rollout::new([("a", 0.5), ("b", 0.5)], None).expect("valid rollout"))
        .build()
        .expect("valid split config")
}

#[allow(dead_code)]
pub fn document(configs: impl IntoIterator<Item = VariableConfig>) -> VariablesConfig {
    VariablesConfig::from_variables(configs).expect("unique names")
}

/// Callback counter usable with `on_change`.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Counter {
    pub fn callback(&self) -> impl Fn() + Send + Sync + 'static {
        let inner = Arc::clone(&self.0);
        move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

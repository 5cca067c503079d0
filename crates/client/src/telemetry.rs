//! Resolution telemetry: the `on_resolve` hook and baggage annotation.
//!
//! Responsibilities:
//! - Let external observability code subscribe to resolutions.
//! - Publish `variables.<name>=<variant>` into the OpenTelemetry baggage for
//!   the lifetime of a resolved value.
//!
//! Does NOT handle:
//! - Creating spans or configuring exporters; applications own those.

use opentelemetry::baggage::BaggageExt;
use opentelemetry::{Context, ContextGuard, KeyValue};
use tracing::debug;

use crate::resolver::ResolutionSource;

/// Prefix of the baggage key published for each resolved variable.
pub const BAGGAGE_KEY_PREFIX: &str = "variables.";

/// Receives every resolution performed through a `Variable` handle.
pub trait ResolveHook: Send + Sync {
    fn on_resolve(&self, name: &str, variant: Option<&str>, version: Option<u32>);
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolveHook;

impl ResolveHook for NoopResolveHook {
    fn on_resolve(&self, _name: &str, _variant: Option<&str>, _version: Option<u32>) {}
}

/// Emits a `tracing` event per resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingResolveHook;

impl ResolveHook for TracingResolveHook {
    fn on_resolve(&self, name: &str, variant: Option<&str>, version: Option<u32>) {
        debug!(
            target: "variables::resolve",
            variable = %name,
            variant = variant.unwrap_or(""),
            version = ?version,
            "Variable resolved"
        );
    }
}

/// Baggage value describing a resolution: the variant key, or the source in
/// angle brackets when no variant was selected.
pub(crate) fn annotation_value(variant: Option<&str>, source: ResolutionSource) -> String {
    match variant {
        Some(key) => key.to_string(),
        None => format!("<{}>", source.as_str()),
    }
}

/// Attach `variables.<name>=<value>` to the current context until the guard drops.
pub(crate) fn annotate(name: &str, value: String) -> ContextGuard {
    Context::current_with_baggage(vec![KeyValue::new(
        format!("{BAGGAGE_KEY_PREFIX}{name}"),
        value,
    )])
    .attach()
}

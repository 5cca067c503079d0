//! Ambient attributes and targeting keys from the OpenTelemetry context.
//!
//! Responsibilities:
//! - Merge resource attributes and baggage under caller-supplied attributes.
//! - Derive a targeting key when the caller does not supply one.
//!
//! Does NOT handle:
//! - Installing tracer providers or propagators (the application owns those).
//!
//! Invariants:
//! - Precedence on key collision: caller > baggage > resource.
//! - Resource attributes are detected once per process.

use std::sync::OnceLock;

use opentelemetry::Context;
use opentelemetry::baggage::BaggageExt;
use opentelemetry::trace::TraceContextExt;
use opentelemetry_sdk::Resource;
use serde_json::Value;
use variables_config::{Attributes, Settings};

/// Which ambient sources feed the attribute map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    pub include_resource_attributes: bool,
    pub include_baggage: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            include_resource_attributes: true,
            include_baggage: true,
        }
    }
}

impl ContextOptions {
    /// Neither resource attributes nor baggage.
    pub fn caller_only() -> Self {
        Self {
            include_resource_attributes: false,
            include_baggage: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            include_resource_attributes: settings.include_resource_attributes,
            include_baggage: settings.include_baggage,
        }
    }
}

/// Caller attributes layered over the enabled ambient sources.
pub fn merged_attributes(caller: &Attributes, options: ContextOptions) -> Attributes {
    if !options.include_resource_attributes && !options.include_baggage {
        return caller.clone();
    }

    let mut merged = Attributes::new();
    if options.include_resource_attributes {
        merged.extend(
            resource_attributes()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }
    if options.include_baggage {
        merged.extend(baggage_attributes(&Context::current()));
    }
    merged.extend(caller.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// The active trace id if one is valid, otherwise a fresh UUID v4.
pub fn ambient_targeting_key() -> String {
    let cx = Context::current();
    let span = cx.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        span_context.trace_id().to_string()
    } else {
        uuid::Uuid::new_v4().to_string()
    }
}

fn resource_attributes() -> &'static Attributes {
    static RESOURCE: OnceLock<Attributes> = OnceLock::new();
    RESOURCE.get_or_init(|| {
        Resource::builder()
            .build()
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), otel_to_json(value)))
            .collect()
    })
}

fn baggage_attributes(cx: &Context) -> Attributes {
    cx.baggage()
        .iter()
        .map(|(key, (value, _metadata))| {
            (
                key.as_str().to_string(),
                Value::String(value.as_str().to_string()),
            )
        })
        .collect()
}

fn otel_to_json(value: &opentelemetry::Value) -> Value {
    match value {
        opentelemetry::Value::Bool(b) => Value::Bool(*b),
        opentelemetry::Value::I64(i) => Value::from(*i),
        opentelemetry::Value::F64(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => Value::String(other.as_str().into_owned()),
    }
}

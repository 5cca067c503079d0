//! Administrative operations: schema push, pull and bulk validation.
//!
//! Responsibilities:
//! - Diff declared variables against the backend by JSON schema.
//! - Render the human-readable push summary.
//! - Push (with dry-run, strict and confirmation gates), pull and validate.
//!
//! Does NOT handle:
//! - Prompting; callers supply the confirmation decision.
//! - Full JSON Schema validation; `SchemaCheck` is the seam for a real validator.
//!
//! Invariants:
//! - `dry_run` and declined confirmations never call `ConfigBackend::push`.
//! - Strict mode fails before any mutation when incompatibilities exist.
//! - Errors are returned, never swallowed, so CI callers can fail builds.

use std::fmt;

use serde_json::Value;
use tracing::{info, warn};
use variables_config::VariablesConfig;

use crate::backend::ConfigBackend;
use crate::error::{Result, VariablesError};

/// Checks a JSON value against a JSON schema.
pub trait SchemaCheck: Send + Sync {
    fn check(&self, schema: &Value, value: &Value) -> std::result::Result<(), String>;
}

/// Honors the `type` (single name or list) and `enum` keywords only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeSchemaCheck;

impl SchemaCheck for TypeSchemaCheck {
    fn check(&self, schema: &Value, value: &Value) -> std::result::Result<(), String> {
        if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
            && !allowed.contains(value)
        {
            return Err(format!("{value} is not one of the allowed values"));
        }

        match schema.get("type") {
            None => Ok(()),
            Some(Value::String(name)) => check_type(name, value),
            Some(Value::Array(names)) => {
                let names: Vec<&str> = names.iter().filter_map(Value::as_str).collect();
                if names.iter().any(|name| check_type(name, value).is_ok()) {
                    Ok(())
                } else {
                    Err(format!("expected one of [{}], got {}", names.join(", "), type_name(value)))
                }
            }
            Some(other) => Err(format!("unsupported type keyword: {other}")),
        }
    }
}

fn check_type(name: &str, value: &Value) -> std::result::Result<(), String> {
    let matches = match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        other => return Err(format!("unknown schema type '{other}'")),
    };
    if matches {
        Ok(())
    } else {
        Err(format!("expected {name}, got {}", type_name(value)))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An existing variant whose value fails a variable's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatibility {
    pub variable: String,
    pub variant: String,
    pub message: String,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.variable, self.variant, self.message)
    }
}

/// Result of checking every variant against its variable's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub checked: usize,
    pub failures: Vec<Incompatibility>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

fn check_variants(
    name: &str,
    schema: &Value,
    config: &variables_config::VariableConfig,
    checker: &dyn SchemaCheck,
    report: &mut ValidationReport,
) {
    for variant in config.variants().values() {
        report.checked += 1;
        let outcome = variant
            .json_value()
            .map_err(|e| format!("value is not valid JSON: {e}"))
            .and_then(|value| checker.check(schema, &value));
        if let Err(message) = outcome {
            report.failures.push(Incompatibility {
                variable: name.to_string(),
                variant: variant.key.clone(),
                message,
            });
        }
    }
}

/// Check every variant of every variable that declares a schema.
pub fn validate_all(config: &VariablesConfig, checker: &dyn SchemaCheck) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (name, variable) in &config.variables {
        if let Some(schema) = variable.json_schema() {
            check_variants(name, schema, variable, checker, &mut report);
        }
    }
    report
}

/// Diff between declared variables and the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PushPlan {
    pub new: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub incompatibilities: Vec<Incompatibility>,
    merged: VariablesConfig,
}

impl PushPlan {
    /// Classify each local variable as new, changed or unchanged by `json_schema`.
    ///
    /// A declaration without a schema keeps the remote one on merge, so it
    /// counts as unchanged.
    ///
    /// For changed variables, every existing remote variant is checked against
    /// the new schema.
    pub fn compute(
        local: &VariablesConfig,
        remote: &VariablesConfig,
        checker: &dyn SchemaCheck,
    ) -> Self {
        let mut plan = Self {
            new: Vec::new(),
            changed: Vec::new(),
            unchanged: Vec::new(),
            incompatibilities: Vec::new(),
            merged: remote.merge(local),
        };

        for (name, declared) in &local.variables {
            match remote.get(name) {
                None => plan.new.push(name.clone()),
                Some(existing)
                    if declared
                        .json_schema()
                        .is_none_or(|schema| existing.json_schema() == Some(schema)) =>
                {
                    plan.unchanged.push(name.clone())
                }
                Some(existing) => {
                    plan.changed.push(name.clone());
                    if let Some(schema) = declared.json_schema() {
                        let mut report = ValidationReport::default();
                        check_variants(name, schema, existing, checker, &mut report);
                        plan.incompatibilities.extend(report.failures);
                    }
                }
            }
        }
        plan
    }

    pub fn has_changes(&self) -> bool {
        !self.new.is_empty() || !self.changed.is_empty()
    }

    /// The document that would be pushed: remote state with local declarations applied.
    pub fn merged(&self) -> &VariablesConfig {
        &self.merged
    }

    /// Human-readable summary with `+`/`~`/`=` markers.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let sections = [
            ("New variables", '+', &self.new),
            ("Schema updates", '~', &self.changed),
            ("Unchanged", '=', &self.unchanged),
        ];
        for (title, marker, names) in sections {
            out.push_str(&format!("{title} ({})\n", names.len()));
            for name in names {
                out.push_str(&format!("  {marker} {name}\n"));
            }
        }
        if !self.incompatibilities.is_empty() {
            out.push_str(&format!(
                "Incompatible variants ({})\n",
                self.incompatibilities.len()
            ));
            for incompatibility in &self.incompatibilities {
                out.push_str(&format!("  ! {incompatibility}\n"));
            }
        }
        out
    }
}

/// Gates applied by `push`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Compute and report the plan without mutating the backend.
    pub dry_run: bool,
    /// Treat incompatible existing variants as a hard failure.
    pub strict: bool,
    /// Push without asking for confirmation.
    pub skip_confirmation: bool,
}

/// What `push` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    NoChanges,
    DryRun,
    Declined,
    Pushed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushReport {
    pub plan: PushPlan,
    pub outcome: PushOutcome,
}

/// Push declared schemas to the backend.
///
/// `confirm` sees the plan and decides whether to mutate; it is not called
/// for dry runs, plans without changes or with `skip_confirmation`.
///
/// # Errors
///
/// Returns `ConfigFetch` if the backend fails, or `ConfigConflict` in strict
/// mode when existing variants do not satisfy a new schema.
pub async fn push(
    backend: &dyn ConfigBackend,
    local: &VariablesConfig,
    options: PushOptions,
    checker: &dyn SchemaCheck,
    confirm: impl FnOnce(&PushPlan) -> bool,
) -> Result<PushReport> {
    let remote = backend.fetch().await?;
    let plan = PushPlan::compute(local, &remote, checker);

    if !plan.incompatibilities.is_empty() {
        if options.strict {
            return Err(VariablesError::ConfigConflict {
                conflicts: plan
                    .incompatibilities
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
        for incompatibility in &plan.incompatibilities {
            warn!(
                variable = %incompatibility.variable,
                variant = %incompatibility.variant,
                message = %incompatibility.message,
                "Existing variant incompatible with new schema"
            );
        }
    }

    let outcome = if !plan.has_changes() {
        PushOutcome::NoChanges
    } else if options.dry_run {
        PushOutcome::DryRun
    } else if !options.skip_confirmation && !confirm(&plan) {
        PushOutcome::Declined
    } else {
        backend.push(plan.merged()).await?;
        info!(
            new = plan.new.len(),
            changed = plan.changed.len(),
            "Pushed variable schemas"
        );
        PushOutcome::Pushed
    };

    Ok(PushReport { plan, outcome })
}

/// Fetch the backend's current declaration.
///
/// # Errors
///
/// Returns `ConfigFetch` if the backend fails.
pub async fn pull(backend: &dyn ConfigBackend) -> Result<VariablesConfig> {
    let config = backend.fetch().await?;
    info!(variables = config.len(), "Pulled variables configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use variables_config::{Rollout, VariableConfig, Variant};

    fn declared(name: &str, schema: Value) -> VariableConfig {
        VariableConfig::builder(name).json_schema(schema).build().unwrap()
    }

    fn served(name: &str, schema: Value, values: &[(&str, Value)]) -> VariableConfig {
        let mut builder = VariableConfig::builder(name).json_schema(schema);
        for (key, value) in values {
            builder = builder.variant(Variant::from_json(*key, value));
        }
        builder.rollout(Rollout::empty()).build().unwrap()
    }

    #[test]
    fn test_type_schema_check() {
        let check = TypeSchemaCheck;
        assert!(check.check(&json!({"type": "integer"}), &json!(3)).is_ok());
        assert!(check.check(&json!({"type": "integer"}), &json!(3.0)).is_ok());
        assert!(check.check(&json!({"type": "integer"}), &json!(3.5)).is_err());
        assert!(check.check(&json!({"type": ["string", "null"]}), &json!(null)).is_ok());
        assert!(check.check(&json!({"type": ["string", "null"]}), &json!(1)).is_err());
        assert!(check.check(&json!({"enum": ["a", "b"]}), &json!("c")).is_err());
        assert!(check.check(&json!({}), &json!({"any": "thing"})).is_ok());
        assert!(check.check(&json!({"type": "decimal"}), &json!(1)).is_err());
    }

    #[test]
    fn test_plan_classification() {
        let local = VariablesConfig::from_variables([
            declared("added", json!({"type": "string"})),
            declared("retyped", json!({"type": "integer"})),
            declared("same", json!({"type": "boolean"})),
        ])
        .unwrap();
        let remote = VariablesConfig::from_variables([
            served("retyped", json!({"type": "string"}), &[("short", json!("s"))]),
            served("same", json!({"type": "boolean"}), &[("on", json!(true))]),
        ])
        .unwrap();

        let plan = PushPlan::compute(&local, &remote, &TypeSchemaCheck);
        assert_eq!(plan.new, vec!["added"]);
        assert_eq!(plan.changed, vec!["retyped"]);
        assert_eq!(plan.unchanged, vec!["same"]);
        assert_eq!(plan.incompatibilities.len(), 1);
        assert_eq!(plan.incompatibilities[0].variant, "short");

        let merged = plan.merged().get("retyped").unwrap();
        assert_eq!(merged.json_schema(), Some(&json!({"type": "integer"})));
        assert!(merged.variant("short").is_some());
    }

    #[test]
    fn test_declaration_without_schema_is_unchanged() {
        let local = VariablesConfig::from_variables([
            VariableConfig::builder("flag").build().unwrap(),
        ])
        .unwrap();
        let remote = VariablesConfig::from_variables([served(
            "flag",
            json!({"type": "boolean"}),
            &[("on", json!(true))],
        )])
        .unwrap();

        let plan = PushPlan::compute(&local, &remote, &TypeSchemaCheck);
        assert_eq!(plan.unchanged, vec!["flag"]);
        assert!(plan.changed.is_empty());
        assert!(!plan.has_changes());
        assert_eq!(plan.merged(), &remote);
    }

    #[test]
    fn test_render_summary_lists_incompatibilities() {
        let local =
            VariablesConfig::from_variables([declared("limit", json!({"type": "integer"}))])
                .unwrap();
        let remote = VariablesConfig::from_variables([served(
            "limit",
            json!({"type": "string"}),
            &[("short", json!("s"))],
        )])
        .unwrap();

        let summary = PushPlan::compute(&local, &remote, &TypeSchemaCheck).render_summary();
        assert!(summary.contains("Schema updates (1)\n  ~ limit\n"));
        assert!(summary.ends_with(
            "Incompatible variants (1)\n  ! limit/short: expected integer, got string\n"
        ));
    }

    #[test]
    fn test_render_summary() {
        let local = VariablesConfig::from_variables([
            declared("added", json!({"type": "string"})),
            declared("same", json!({"type": "boolean"})),
        ])
        .unwrap();
        let remote =
            VariablesConfig::from_variables([declared("same", json!({"type": "boolean"}))]).unwrap();

        let summary = PushPlan::compute(&local, &remote, &TypeSchemaCheck).render_summary();
        assert_eq!(
            summary,
            "New variables (1)\n  + added\nSchema updates (0)\nUnchanged (1)\n  = same\n"
        );
    }

    #[test]
    fn test_validate_all_reports_failures() {
        let config = VariablesConfig::from_variables([
            served(
                "limit",
                json!({"type": "integer"}),
                &[("low", json!(10)), ("bad", json!("ten"))],
            ),
            VariableConfig::builder("free_form")
                .variant(Variant::new("any", "[1, 2]"))
                .build()
                .unwrap(),
        ])
        .unwrap();

        let report = validate_all(&config, &TypeSchemaCheck);
        assert_eq!(report.checked, 2);
        assert!(!report.is_ok());
        assert_eq!(report.failures[0].to_string(), "limit/bad: expected integer, got string");
    }
}

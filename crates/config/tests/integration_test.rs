//! Integration tests for loading variable declarations from files.
//!
//! # Invariants
//! - JSON and YAML declarations decode to identical models
//! - Unknown extensions are rejected rather than guessed
//!
//! # What this does NOT handle
//! - Settings loading (covered by the loader unit tests)

use std::fs;

use tempfile::TempDir;
use variables_config::{Condition, ModelError, Rollout, VariablesConfig};

const JSON_DECLARATION: &str = r#"{
  "variables": {
    "checkout_flow": {
      "description": "Which checkout flow to show",
      "json_schema": {"type": "string"},
      "aliases": ["legacy_checkout"],
      "variants": {
        "classic": {"serialized_value": "\"classic\"", "version": 1},
        "express": {"serialized_value": "\"express\"", "version": 2}
      },
      "rollout": {"variants": {"classic": 0.8, "express": 0.2}},
      "overrides": [
        {
          "conditions": [{"type": "ValueEquals", "attribute": "plan", "value": "enterprise"}],
          "rollout": {"variants": {"express": 1.0}}
        }
      ]
    }
  }
}"#;

const YAML_DECLARATION: &str = r#"
variables:
  checkout_flow:
    description: Which checkout flow to show
    json_schema:
      type: string
    aliases: [legacy_checkout]
    variants:
      classic:
        serialized_value: '"classic"'
        version: 1
      express:
        serialized_value: '"express"'
        version: 2
    rollout:
      variants:
        classic: 0.8
        express: 0.2
    overrides:
      - conditions:
          - type: ValueEquals
            attribute: plan
            value: enterprise
        rollout:
          variants:
            express: 1.0
"#;

#[test]
fn test_json_and_yaml_declarations_agree() {
    let temp_dir = TempDir::new().unwrap();
    let json_path = temp_dir.path().join("variables.json");
    let yaml_path = temp_dir.path().join("variables.yaml");
    fs::write(&json_path, JSON_DECLARATION).unwrap();
    fs::write(&yaml_path, YAML_DECLARATION).unwrap();

    let from_json = VariablesConfig::from_path(&json_path).unwrap();
    let from_yaml = VariablesConfig::from_path(&yaml_path).unwrap();
    assert_eq!(from_json, from_yaml);

    let checkout = from_json.get("checkout_flow").unwrap();
    assert_eq!(checkout.aliases(), ["legacy_checkout".to_string()]);
    assert_eq!(checkout.overrides().len(), 1);
    assert_eq!(
        checkout.overrides()[0].conditions,
        vec![Condition::equals("plan", "enterprise")]
    );
    assert_eq!(checkout.overrides()[0].rollout, Rollout::single("express"));
}

#[test]
fn test_unknown_extension_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("variables.toml");
    fs::write(&path, "").unwrap();

    let result = VariablesConfig::from_path(&path);
    assert!(matches!(result, Err(ModelError::UnsupportedFormat(_))));
}

#[test]
fn test_missing_file_reports_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.json");

    match VariablesConfig::from_path(&path) {
        Err(ModelError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("Expected Io error, got {:?}", other),
    }
}

#[test]
fn test_invalid_weights_in_document_rejected() {
    let document = r#"{"variables": {"flag": {
        "variants": {"on": {"serialized_value": "true"}},
        "rollout": {"variants": {"on": 1.5}}
    }}}"#;
    assert!(VariablesConfig::from_json_str(document).is_err());
}

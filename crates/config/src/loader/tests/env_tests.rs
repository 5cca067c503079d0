//! Environment variable tests for the settings loader.
//!
//! Responsibilities:
//! - Test that `VARIABLES_*` variables populate settings.
//! - Test that builder values win over environment variables.
//! - Test handling of empty and malformed values.

use std::time::Duration;

use secrecy::ExposeSecret;
use serial_test::serial;

use super::env_lock;
use crate::loader::builder::SettingsLoader;
use crate::loader::env::env_var_or_none;
use crate::loader::error::ConfigError;

#[test]
#[serial]
fn test_env_populates_settings() {
    let _lock = env_lock().lock().unwrap();

    temp_env::with_vars(
        [
            ("VARIABLES_BASE_URL", Some("https://variables.example.com")),
            ("VARIABLES_API_TOKEN", Some("secret-token")),
            ("VARIABLES_POLL_INTERVAL_SECS", Some("15")),
            ("VARIABLES_BLOCK_BEFORE_FIRST_RESOLVE", Some("false")),
            ("VARIABLES_BLOCK_TIMEOUT_MS", Some("250")),
            ("VARIABLES_INCLUDE_BAGGAGE", Some("false")),
        ],
        || {
            let settings = SettingsLoader::new().from_env().unwrap().build().unwrap();

            assert_eq!(
                settings.base_url.as_ref().map(|u| u.host_str()),
                Some(Some("variables.example.com"))
            );
            assert_eq!(
                settings.api_token.as_ref().map(|t| t.expose_secret().to_string()),
                Some("secret-token".to_string())
            );
            assert_eq!(settings.poll_interval, Duration::from_secs(15));
            assert!(!settings.block_before_first_resolve);
            assert_eq!(settings.block_timeout, Duration::from_millis(250));
            assert!(!settings.include_baggage);
            assert!(settings.include_resource_attributes);
        },
    );
}

#[test]
#[serial]
fn test_builder_values_win_over_env() {
    let _lock = env_lock().lock().unwrap();

    temp_env::with_vars([("VARIABLES_POLL_INTERVAL_SECS", Some("15"))], || {
        let settings = SettingsLoader::new()
            .with_poll_interval(Duration::from_secs(60))
            .from_env()
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
    });
}

#[test]
#[serial]
fn test_empty_env_vars_ignored() {
    let _lock = env_lock().lock().unwrap();

    temp_env::with_vars(
        [
            ("VARIABLES_BASE_URL", Some("")),
            ("VARIABLES_API_TOKEN", Some("   ")),
        ],
        || {
            let settings = SettingsLoader::new().from_env().unwrap().build().unwrap();
            assert!(settings.base_url.is_none());
            assert!(settings.api_token.is_none());
        },
    );
}

#[test]
#[serial]
fn test_malformed_env_value_rejected() {
    let _lock = env_lock().lock().unwrap();

    temp_env::with_vars([("VARIABLES_POLL_INTERVAL_SECS", Some("soon"))], || {
        let result = SettingsLoader::new().from_env();
        match result {
            Err(ConfigError::InvalidValue { var, .. }) => {
                assert_eq!(var, "VARIABLES_POLL_INTERVAL_SECS");
            }
            Err(e) => panic!("Expected InvalidValue, got {:?}", e),
            Ok(_) => panic!("Expected InvalidValue, got Ok"),
        }
    });
}

#[test]
#[serial]
fn test_env_var_or_none_trims() {
    let _lock = env_lock().lock().unwrap();

    temp_env::with_vars([("VARIABLES_TEST_TRIM", Some("  value  "))], || {
        assert_eq!(
            env_var_or_none("VARIABLES_TEST_TRIM"),
            Some("value".to_string())
        );
    });
}

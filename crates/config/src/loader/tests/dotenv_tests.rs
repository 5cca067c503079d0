//! Tests for dotenv loading behavior.
//!
//! Responsibilities:
//! - Test that missing `.env` files are silently ignored.
//! - Test that invalid `.env` files return errors without leaking secrets.
//! - Test that `DOTENV_DISABLED=1`/`true` skips dotenv loading.
//!
//! Invariants / Assumptions:
//! - Tests must serialize mutations to process-global state (cwd/env).
//! - `.env` fixtures never set `VARIABLES_*` keys, so they cannot leak into other tests.

use std::fs;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::TempDir;

use super::env_lock;
use crate::loader::builder::SettingsLoader;
use crate::loader::error::ConfigError;

/// RAII guard for temporarily changing the current working directory.
struct CwdGuard {
    original_dir: PathBuf,
}

impl CwdGuard {
    fn new(temp_dir: &TempDir) -> Self {
        let original_dir = std::env::current_dir().expect("Failed to get current directory");
        std::env::set_current_dir(temp_dir.path()).expect("Failed to set current directory");
        Self { original_dir }
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original_dir);
    }
}

#[test]
#[serial]
fn test_missing_dotenv_is_ok() {
    let _lock = env_lock().lock().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let _cwd_guard = CwdGuard::new(&temp_dir);

    temp_env::with_var_unset("DOTENV_DISABLED", || {
        let result = SettingsLoader::new().load_dotenv();
        assert!(
            result.is_ok(),
            "Missing .env file should be silently ignored"
        );
    });
}

#[test]
#[serial]
fn test_valid_dotenv_is_ok() {
    let _lock = env_lock().lock().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let _cwd_guard = CwdGuard::new(&temp_dir);

    fs::write(
        temp_dir.path().join(".env"),
        "DOTENV_FIXTURE_VALUE=loaded\n",
    )
    .unwrap();

    temp_env::with_var_unset("DOTENV_DISABLED", || {
        let result = SettingsLoader::new().load_dotenv();
        assert!(result.is_ok(), "Valid .env file should load successfully");
    });
}

#[test]
#[serial]
fn test_dotenv_parse_error_does_not_leak_secrets() {
    let _lock = env_lock().lock().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let _cwd_guard = CwdGuard::new(&temp_dir);

    let secret_value = "supersecret_token_12345";
    fs::write(
        temp_dir.path().join(".env"),
        format!(
            "DOTENV_FIXTURE_SECRET={}\nINVALID_LINE_WITHOUT_EQUALS",
            secret_value
        ),
    )
    .unwrap();

    temp_env::with_var_unset("DOTENV_DISABLED", || {
        match SettingsLoader::new().load_dotenv() {
            Err(e @ ConfigError::DotenvParse { .. }) => {
                let error_string = e.to_string();
                assert!(
                    !error_string.contains(secret_value),
                    "Error message should NOT contain the secret value: {}",
                    error_string
                );
                assert!(
                    error_string.contains("DOTENV_DISABLED"),
                    "Error should hint about DOTENV_DISABLED: {}",
                    error_string
                );
            }
            Err(other) => panic!("Expected DotenvParse error, got {}", other),
            Ok(_) => panic!("Expected error for invalid .env file, got Ok"),
        }
    });
}

#[test]
#[serial]
fn test_dotenv_disabled_skips_invalid_file() {
    let _lock = env_lock().lock().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let _cwd_guard = CwdGuard::new(&temp_dir);

    fs::write(temp_dir.path().join(".env"), "INVALID_LINE_WITHOUT_EQUALS").unwrap();

    for value in ["1", "true"] {
        temp_env::with_var("DOTENV_DISABLED", Some(value), || {
            let result = SettingsLoader::new().load_dotenv();
            assert!(
                result.is_ok(),
                "DOTENV_DISABLED={} should skip .env loading even if file is invalid",
                value
            );
        });
    }
}

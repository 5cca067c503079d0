//! Settings loader for environment variables and `.env` files.
//!
//! Responsibilities:
//! - Load engine settings from `.env` files, environment variables and builder calls.
//! - Provide a builder-pattern `SettingsLoader` for layered settings.
//! - Enforce `DOTENV_DISABLED` gate to prevent accidental dotenv loading in tests.
//!
//! Does NOT handle:
//! - Loading variable declarations (see `VariablesConfig::from_path`).
//!
//! Invariants / Assumptions:
//! - Builder values take precedence over environment variables.
//! - `load_dotenv()` must be called explicitly to enable `.env` file loading.

mod builder;
mod env;
mod error;

#[cfg(test)]
mod tests;

pub use builder::SettingsLoader;
pub use env::env_var_or_none;
pub use error::ConfigError;

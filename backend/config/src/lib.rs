//! `focusmate-config`: engine configuration and API-profile management.
//!
//! - Typed YAML schema with optional sections
//! - `${ENV_VAR}` substitution
//! - Defaults and validation
//! - Redaction for display
//! - Provider profiles kept in the key-value store

pub mod defaults;
pub mod env;
pub mod io;
pub mod profiles;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use profiles::{ApiProfile, ProfileStore, ACTIVE_PROFILE_KEY, PROFILES_KEY};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{EngineConfig, StorageLocation};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Load a config file, substitute env vars, apply defaults and validate.
///
/// Validation errors fail the load; warnings are only logged.
pub async fn load_and_prepare(path: &Path) -> Result<EngineConfig> {
    let raw = load_config(path).await?;

    let value: Value =
        serde_json::to_value(&raw).context("Failed to serialize config for processing")?;
    let vars = collect_referenced_vars(&value);
    if !vars.is_empty() {
        debug!(?vars, "Resolving env vars in config");
    }
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;

    let config: EngineConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!("{} config error(s) in {}", report.errors.len(), path.display());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepares_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        tokio::fs::write(&path, "history:\n  chatWindow: 5\n").await.unwrap();

        let cfg = load_and_prepare(&path).await.unwrap();
        let history = cfg.history.unwrap();
        assert_eq!(history.chat_window, Some(5));
        assert_eq!(history.max_entries, Some(50));
        assert_eq!(cfg.server.unwrap().port, Some(3000));
    }

    #[tokio::test]
    async fn invalid_config_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        tokio::fs::write(&path, "history:\n  maxEntries: 0\n").await.unwrap();
        assert!(load_and_prepare(&path).await.is_err());
    }
}

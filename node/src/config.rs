//! # Ledger Configuration Loading
//!
//! Resolution order, later wins:
//!
//! 1. Built-in defaults ([`LedgerConfig::default`]).
//! 2. A JSON file: `--config`, or `config.json` in the data directory.
//! 3. Individual CLI flags / `PASSLOCK_*` environment variables.
//!
//! The result is validated before the node touches it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use passlock_contracts::LedgerConfig;
use passlock_protocol::asset::AccountId;

use crate::cli::LedgerOverrides;

/// Name of the config file `init` writes into the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Builds the effective ledger config.
///
/// `data_dir` is where to look for `config.json` when no explicit path is
/// given. A missing implicit file is fine; a missing explicit one is not.
pub fn load_ledger_config(overrides: &LedgerOverrides, data_dir: Option<&Path>) -> Result<LedgerConfig> {
    let mut config = match config_path(overrides, data_dir) {
        Some(path) => read_config_file(&path)?,
        None => LedgerConfig::default(),
    };

    if let Some(secs) = overrides.cancel_cooldown_secs {
        config.cancel_cooldown_secs = secs;
    }
    if let Some(len) = overrides.min_password_length {
        config.min_password_length = len;
    }
    if let Some(treasury) = &overrides.treasury {
        config.treasury = Some(AccountId::new(treasury.clone()));
    }

    config.validate().context("invalid ledger configuration")?;
    Ok(config)
}

/// Writes `config` as pretty JSON.
pub fn write_config_file(path: &Path, config: &LedgerConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("failed to serialize ledger config")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write config to {}", path.display()))
}

fn config_path(overrides: &LedgerOverrides, data_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(explicit) = &overrides.config {
        return Some(explicit.clone());
    }
    data_dir
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

fn read_config_file(path: &Path) -> Result<LedgerConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_ledger_config(&LedgerOverrides::default(), Some(dir.path())).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn data_dir_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "cancel_cooldown_secs": 120, "min_password_length": 12 }"#,
        )
        .unwrap();

        let overrides = LedgerOverrides {
            min_password_length: Some(10),
            treasury: Some("ops".into()),
            ..LedgerOverrides::default()
        };
        let config = load_ledger_config(&overrides, Some(dir.path())).unwrap();
        assert_eq!(config.cancel_cooldown_secs, 120);
        assert_eq!(config.min_password_length, 10);
        assert_eq!(config.treasury, Some(AccountId::from("ops")));
    }

    #[test]
    fn written_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let original = LedgerConfig {
            cancel_cooldown_secs: 900,
            ..LedgerConfig::default()
        };
        write_config_file(&path, &original).unwrap();

        let overrides = LedgerOverrides {
            config: Some(path),
            ..LedgerOverrides::default()
        };
        assert_eq!(load_ledger_config(&overrides, None).unwrap(), original);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let overrides = LedgerOverrides {
            config: Some(PathBuf::from("/definitely/not/here.json")),
            ..LedgerOverrides::default()
        };
        assert!(load_ledger_config(&overrides, None).is_err());
    }

    #[test]
    fn zero_scaling_factor_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "fees": { "limit_one": 1, "limit_two": 2, "rate_one": 1, "rate_two": 1, "rate_three": 1, "scaling_factor": 0 } }"#).unwrap();

        let overrides = LedgerOverrides {
            config: Some(path),
            ..LedgerOverrides::default()
        };
        let err = load_ledger_config(&overrides, None).unwrap_err();
        assert!(format!("{:#}", err).contains("scaling factor"));
    }
}

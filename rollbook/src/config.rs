//! Layered configuration loading using figment.
//!
//! Sources, highest priority first:
//! 1. Environment variables with the `ROLLBOOK_` prefix (`__` separates nested keys)
//! 2. `rollbook.toml` in the working directory
//! 3. Built-in defaults
//!
//! `ROLLBOOK_DATABASE_URL` maps to `database_url`, `ROLLBOOK_LOG` to `log`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Project-local configuration file, read when present.
pub const CONFIG_FILE: &str = "rollbook.toml";

/// Prefix of the environment variables that override file and default values.
pub const ENV_PREFIX: &str = "ROLLBOOK_";

/// A transient database that lives as long as its session.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RollbookConfig {
    /// libSQL database location: a file path or `:memory:`.
    pub database_url: String,
    /// Default `tracing` filter directive, used when `ROLLBOOK_LOG` is unset.
    pub log: String,
}

impl Default for RollbookConfig {
    fn default() -> Self {
        Self {
            database_url: IN_MEMORY.to_string(),
            log: "info".to_string(),
        }
    }
}

impl RollbookConfig {
    /// Load configuration from defaults, `rollbook.toml` and the environment.
    ///
    /// Does NOT read `.env`; the binary calls `dotenvy` before this.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Build the provider chain. Public so callers can layer extra providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            figment = figment.merge(Toml::file(local));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate a configuration from any figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url == IN_MEMORY
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database_url".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_an_in_memory_database() {
        let config = RollbookConfig::default();
        assert!(config.is_in_memory());
        assert_eq!(config.log, "info");
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let figment = Figment::from(Serialized::defaults(RollbookConfig {
            database_url: "  ".into(),
            ..RollbookConfig::default()
        }));
        let err = RollbookConfig::from_figment(figment).unwrap_err();
        assert!(
            err.to_string().contains("database_url"),
            "unexpected error: {err}"
        );
    }
}

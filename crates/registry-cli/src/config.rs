//! Registry configuration.
//!
//! Values are resolved in this order, later sources winning:
//! built-in defaults, the TOML file, environment variables
//! (`REGISTRY_DB_PATH`, `REGISTRY_HASH_PASSWORDS`), and finally the
//! `--db` command-line flag. A missing TOML file is not an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use registry_store::RegistryOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ENV_DB_PATH: &str = "REGISTRY_DB_PATH";
pub const ENV_HASH_PASSWORDS: &str = "REGISTRY_HASH_PASSWORDS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Location of the SQLite file.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Store PBKDF2 password hashes instead of plaintext.
    pub hash_passwords: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/registry.db"),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hash_passwords: true,
        }
    }
}

impl RegistryConfig {
    /// Load from `path` if it exists, otherwise start from defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_HASH_PASSWORDS) {
            self.security.hash_passwords = parse_bool(&raw)
                .with_context(|| format!("invalid value for {ENV_HASH_PASSWORDS}"))?;
        }
        Ok(())
    }

    /// Full resolution: file, then process environment, then the `--db` flag.
    pub fn resolve(config_path: &Path, db_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        if let Some(path) = db_override {
            config.database.path = path;
        }
        Ok(config)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            hash_passwords: self.security.hash_passwords,
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

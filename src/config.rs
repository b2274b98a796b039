// ⚙️ Config - where the chain lives and who is calling
//
// Precedence (lowest to highest): defaults, TOML file, environment, CLI flags.

use crate::chain::DEFAULT_ACTOR;
use crate::error::{ContractError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "PRIMER_DB_PATH";
pub const ENV_SERVER_ADDR: &str = "PRIMER_SERVER_ADDR";
pub const ENV_ACTOR: &str = "PRIMER_ACTOR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding chain state and events
    pub db_path: PathBuf,

    /// Bind address for the HTTP server
    pub server_addr: String,

    /// Name recorded on events
    pub actor: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("primer.db"),
            server_addr: "127.0.0.1:3000".to_string(),
            actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| ContractError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ContractError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&source)
    }

    /// Defaults, then optional file, then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from a key lookup (the environment, in practice)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup(ENV_DB_PATH) {
            self.db_path = PathBuf::from(db_path);
        }
        if let Some(addr) = lookup(ENV_SERVER_ADDR) {
            self.server_addr = addr;
        }
        if let Some(actor) = lookup(ENV_ACTOR) {
            self.actor = actor;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from("primer.db"));
        assert_eq!(config.actor, "deployer");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("actor = \"alice\"\n").unwrap();
        assert_eq!(config.actor, "alice");
        assert_eq!(config.server_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = Config::from_toml("actor = [").unwrap_err();
        assert!(matches!(err, ContractError::Config(_)));
    }

    #[test]
    fn test_overrides_win() {
        let env: HashMap<&str, &str> = [
            (ENV_DB_PATH, "/tmp/chain.db"),
            (ENV_ACTOR, "bob"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_toml("actor = \"alice\"")
            .unwrap()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/tmp/chain.db"));
        assert_eq!(config.actor, "bob");
        assert_eq!(config.server_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/primer.toml")).unwrap_err();
        assert!(matches!(err, ContractError::Config(_)));
    }
}

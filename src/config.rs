//! Session configuration
//!
//! Defaults applied while building transfers when a batch record leaves a
//! field out. Loaded from a JSON file; every key is optional.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::Network;

/// Errors loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Defaults for one signing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Network used when a record names none (or an unrecognized one)
    pub default_network: Network,
    /// Fee in micro-STX used when a record has no `fee`
    pub default_fee: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_network: Network::Mainnet,
            default_fee: 0,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        debug!("Loaded session config from {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Load `path` if given, otherwise the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.default_network = network;
        self
    }

    pub fn with_fee(mut self, fee: u64) -> Self {
        self.default_fee = fee;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.default_network, Network::Mainnet);
        assert_eq!(config.default_fee, 0);
        assert_eq!(SessionConfig::load_or_default(None).unwrap(), config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let config = SessionConfig::default()
            .with_network(Network::Testnet)
            .with_fee(250);
        config.save(&path).unwrap();

        assert_eq!(SessionConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{ "defaultFee": 180 }"#).unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.default_fee, 180);
        assert_eq!(config.default_network, Network::Mainnet);
    }

    #[test]
    fn test_bad_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            SessionConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SessionConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}

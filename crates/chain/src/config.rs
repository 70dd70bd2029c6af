//! Ledger configuration.

use crate::mempool::MempoolConfig;
use serde::{Deserialize, Serialize};
use simchain_core::{ErrorKind, Fingerprint};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or checking a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Chain configuration.
///
/// Every field has a default, so a partial JSON document only overrides
/// what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Mempool parameters.
    pub mempool: MempoolConfig,
    /// Balance allocated to the root account at genesis.
    pub genesis_balance: u64,
    /// Sentinel parent fingerprint of the genesis block.
    pub genesis_parent: Fingerprint,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            mempool: MempoolConfig::default(),
            genesis_balance: 100_000,
            genesis_parent: Fingerprint(0xdeadbeef),
        }
    }
}

impl ChainConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mempool.max_size == 0 {
            return Err(ConfigError::Invalid(
                "mempool.max_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let config = ChainConfig::default();
        assert_eq!(config.mempool.max_size, 1024);
        assert_eq!(config.mempool.min_fee, 25);
        assert_eq!(config.genesis_balance, 100_000);
        assert_eq!(config.genesis_parent.to_hex(), "0x00000000deadbeef");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ChainConfig::default();
        let json = config.to_json_pretty().unwrap();
        let back: ChainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: ChainConfig =
            serde_json::from_str(r#"{ "mempool": { "min_fee": 50 } }"#).unwrap();
        assert_eq!(config.mempool.min_fee, 50);
        assert_eq!(config.mempool.max_size, 1024);
        assert_eq!(config.genesis_balance, 100_000);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "genesis_balance": 5000, "genesis_parent": "0x1" }}"#).unwrap();

        let config = ChainConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.genesis_balance, 5000);
        assert_eq!(config.genesis_parent, Fingerprint(1));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "mempool": {{ "max_size": 0 }} }}"#).unwrap();

        assert!(matches!(
            ChainConfig::from_json_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChainConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ChainConfig::from_json_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}

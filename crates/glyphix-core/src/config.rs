//! GLyphIX configuration

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::keystore::KdfParams;
use crate::sharding::ShardPolicy;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphixConfig {
    /// Location of the file-backed key vault
    pub vault_path: PathBuf,

    /// Default split policy
    pub shard_policy: ShardPolicy,

    /// Deny gated access when presence is older than this (seconds)
    pub max_presence_age_secs: Option<u64>,

    /// Argon2id parameters for new vaults
    pub kdf: KdfParams,
}

impl Default for GlyphixConfig {
    fn default() -> Self {
        Self {
            vault_path: Self::default_vault_path(),
            shard_policy: ShardPolicy::default(),
            max_presence_age_secs: None,
            kdf: KdfParams::default(),
        }
    }
}

impl GlyphixConfig {
    fn default_vault_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glyphix")
            .join("vault.json")
    }

    /// Platform config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glyphix")
            .join("config.json")
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, writing defaults if the file does not exist
    pub fn load_or_init(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::default();
        config.save(path)?;
        info!(path = %path.display(), "wrote default configuration");
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create the vault directory if it doesn't exist
    pub fn ensure_directories(&self) -> crate::Result<()> {
        if let Some(parent) = self.vault_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Reject policies and bounds that cannot work
    pub fn validate(&self) -> crate::Result<()> {
        self.shard_policy
            .validate()
            .map_err(|e| Error::Config(format!("shard_policy: {}", e)))?;

        if self.max_presence_age_secs == Some(0) {
            return Err(Error::Config(
                "max_presence_age_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Presence staleness bound, if configured
    pub fn max_presence_age(&self) -> Option<Duration> {
        self.max_presence_age_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(Duration::seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::FactorType;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GlyphixConfig::default();
        assert_eq!(config.shard_policy.threshold, 3);
        assert_eq!(config.shard_policy.factors, FactorType::ALL.to_vec());
        assert!(config.vault_path.ends_with("glyphix/vault.json"));
        assert!(config.max_presence_age().is_none());
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = GlyphixConfig::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(GlyphixConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "max_presence_age_secs": 90 }"#).unwrap();

        let config = GlyphixConfig::load(&path).unwrap();
        assert_eq!(config.max_presence_age(), Some(Duration::seconds(90)));
        assert_eq!(config.shard_policy, ShardPolicy::default());
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "shard_policy": { "threshold": 4, "factors": ["device", "presence"] } }"#,
        )
        .unwrap();

        assert!(matches!(
            GlyphixConfig::load(&path),
            Err(Error::Config(_))
        ));
    }
}

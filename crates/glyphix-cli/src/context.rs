//! Shared state for one CLI invocation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use glyphix_core::{
    EncryptionEngine, FileKeyStore, GlyphLock, GlyphixConfig, PresenceGate, PresenceState,
    ShardManager,
};
use zeroize::Zeroizing;

/// Environment variable holding the vault passphrase
pub const PASSPHRASE_ENV: &str = "GLYPHIX_PASSPHRASE";

/// Unlocked vault plus the components built on it
pub struct Context {
    pub config: GlyphixConfig,
    pub store: Arc<FileKeyStore>,
    pub engine: Arc<EncryptionEngine<FileKeyStore>>,
}

impl Context {
    /// Unlock (or create) the configured vault
    pub fn open(config: GlyphixConfig, passphrase: &str) -> Result<Self> {
        config.ensure_directories()?;

        let store = FileKeyStore::open(&config.vault_path, passphrase, config.kdf)
            .with_context(|| format!("opening vault {}", config.vault_path.display()))?;
        let store = Arc::new(store);
        let engine = Arc::new(EncryptionEngine::new(Arc::clone(&store)));

        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// Shard manager using the configured policy
    pub fn shard_manager(&self) -> Result<ShardManager<FileKeyStore>> {
        Ok(ShardManager::new(
            Arc::clone(&self.store),
            self.config.shard_policy.clone(),
        )?)
    }

    /// Presence gate seeded with `presence`
    pub fn gate(&self, presence: PresenceState) -> PresenceGate<EncryptionEngine<FileKeyStore>> {
        let gate = PresenceGate::new(Arc::clone(&self.engine), presence);
        match self.config.max_presence_age() {
            Some(max_age) => gate.with_max_presence_age(max_age),
            None => gate,
        }
    }

    /// Glyph binder over the vault
    pub fn glyph_lock(&self) -> GlyphLock<FileKeyStore> {
        GlyphLock::new(Arc::clone(&self.engine))
    }
}

/// Config path from the flag (or `GLYPHIX_CONFIG`), else the platform default
pub fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(GlyphixConfig::default_path)
}

/// Read the vault passphrase from `file`, else from `GLYPHIX_PASSPHRASE`
pub fn read_passphrase(file: Option<&Path>) -> Result<Zeroizing<String>> {
    let passphrase = match file {
        Some(path) => {
            let raw = Zeroizing::new(
                std::fs::read_to_string(path)
                    .with_context(|| format!("reading passphrase file {}", path.display()))?,
            );
            Zeroizing::new(raw.trim_end_matches(['\r', '\n']).to_string())
        }
        None => match std::env::var(PASSPHRASE_ENV) {
            Ok(value) => Zeroizing::new(value),
            Err(_) => bail!(
                "no passphrase: set {} or pass --passphrase-file",
                PASSPHRASE_ENV
            ),
        },
    };

    if passphrase.is_empty() {
        bail!("passphrase is empty");
    }
    Ok(passphrase)
}

/// Write secret bytes, owner-only on Unix
pub fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

//! Passphrase-protected file key store
//!
//! All keys are kept in a single vault file, encrypted at rest with
//! ChaCha20-Poly1305 under a wrap key derived from an operator passphrase via
//! Argon2id. Every mutation rewrites the vault with a fresh nonce.
//!
//! # Vault Format
//!
//! JSON object with:
//! - `version` and `algorithm` identifiers
//! - Argon2id parameters and 16-byte salt
//! - 12-byte nonce
//! - ciphertext of the JSON key list (tag appended by ChaCha20-Poly1305)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use argon2::Argon2;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{validate_alias, KeyMaterial, KeyStore};
use crate::component::{Component, ComponentStats, ComponentStatus};
use crate::error::KeyError;
use crate::types::{hex_array, hex_bytes};
use crate::{KEY_SIZE, MAC_SIZE, NONCE_SIZE};

/// Current vault file format version
pub const VAULT_VERSION: u32 = 1;

const VAULT_ALGORITHM: &str = "chacha20poly1305+argon2id";
const VAULT_AAD: &[u8] = b"glyphix-vault-v1";
const SALT_SIZE: usize = 16;

/// Argon2id parameters for the vault wrap key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024, // 64 MB
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Create explicit parameters
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct VaultFile {
    version: u32,
    algorithm: String,
    kdf: KdfParams,
    #[serde(with = "hex_array")]
    salt: [u8; SALT_SIZE],
    #[serde(with = "hex_bytes")]
    nonce: Vec<u8>,
    #[serde(with = "hex_bytes")]
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize, Default)]
struct VaultContents {
    keys: Vec<VaultEntry>,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct VaultEntry {
    alias: String,
    key: String,
}

/// Key store persisted in an encrypted vault file
pub struct FileKeyStore {
    path: PathBuf,
    wrap_key: KeyMaterial,
    salt: [u8; SALT_SIZE],
    kdf: KdfParams,
    keys: RwLock<BTreeMap<String, KeyMaterial>>,
}

impl FileKeyStore {
    /// Unlock the vault at `path`, creating an empty one if it does not exist
    pub fn open(
        path: impl Into<PathBuf>,
        passphrase: &str,
        kdf: KdfParams,
    ) -> Result<Self, KeyError> {
        let path = path.into();
        if path.exists() {
            Self::unlock(path, passphrase)
        } else {
            Self::create(path, passphrase, kdf)
        }
    }

    /// Create a new empty vault; fails if the file already exists
    pub fn create(
        path: impl Into<PathBuf>,
        passphrase: &str,
        kdf: KdfParams,
    ) -> Result<Self, KeyError> {
        let path = path.into();
        if path.exists() {
            return Err(KeyError::AlreadyExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let wrap_key = derive_wrap_key(passphrase, &salt, &kdf)?;

        let store = Self {
            path,
            wrap_key,
            salt,
            kdf,
            keys: RwLock::new(BTreeMap::new()),
        };
        store.persist(&BTreeMap::new())?;

        info!(path = %store.path.display(), "created key vault");
        Ok(store)
    }

    /// Unlock an existing vault
    pub fn unlock(path: impl Into<PathBuf>, passphrase: &str) -> Result<Self, KeyError> {
        let path = path.into();
        let raw = std::fs::read(&path)?;

        let file: VaultFile = serde_json::from_slice(&raw)
            .map_err(|e| KeyError::Storage(format!("Vault parse failed: {}", e)))?;

        if file.version != VAULT_VERSION {
            return Err(KeyError::Storage(format!(
                "Unsupported vault version {}",
                file.version
            )));
        }

        let wrap_key = derive_wrap_key(passphrase, &file.salt, &file.kdf)?;

        let plaintext = Zeroizing::new(
            wrap_key
                .open(&file.nonce, VAULT_AAD, &file.ciphertext)
                .map_err(|_| {
                    warn!(path = %path.display(), "vault unlock failed");
                    KeyError::VaultLocked
                })?,
        );

        let contents: VaultContents = serde_json::from_slice(&plaintext)
            .map_err(|e| KeyError::Storage(format!("Vault contents corrupted: {}", e)))?;

        let mut keys = BTreeMap::new();
        for entry in &contents.keys {
            keys.insert(entry.alias.clone(), KeyMaterial::from_hex(&entry.key)?);
        }

        debug!(path = %path.display(), keys = keys.len(), "unlocked key vault");
        Ok(Self {
            path,
            wrap_key,
            salt: file.salt,
            kdf: file.kdf,
            keys: RwLock::new(keys),
        })
    }

    /// Path of the vault file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Argon2id parameters the vault was created with
    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    fn persist(&self, keys: &BTreeMap<String, KeyMaterial>) -> Result<(), KeyError> {
        let contents = VaultContents {
            keys: keys
                .iter()
                .map(|(alias, key)| VaultEntry {
                    alias: alias.clone(),
                    key: key.to_hex(),
                })
                .collect(),
        };

        let plaintext = Zeroizing::new(
            serde_json::to_vec(&contents)
                .map_err(|e| KeyError::Storage(format!("Serialization failed: {}", e)))?,
        );

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let ciphertext = self.wrap_key.seal(&nonce, VAULT_AAD, &plaintext)?;

        let file = VaultFile {
            version: VAULT_VERSION,
            algorithm: VAULT_ALGORITHM.to_string(),
            kdf: self.kdf,
            salt: self.salt,
            nonce: nonce.to_vec(),
            ciphertext,
        };
        let encoded = serde_json::to_vec_pretty(&file)
            .map_err(|e| KeyError::Storage(format!("Serialization failed: {}", e)))?;

        // Write atomically
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &encoded)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Apply a change to a copy of the key map, persist it, then commit
    ///
    /// The in-memory map only changes once the vault write succeeded, so a
    /// failed write leaves the store exactly as it was.
    fn mutate(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, KeyMaterial>) -> Result<bool, KeyError>,
    ) -> Result<(), KeyError> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = keys.clone();

        if f(&mut next)? {
            self.persist(&next)?;
            *keys = next;
        }
        Ok(())
    }

    fn with_key<T>(
        &self,
        alias: &str,
        f: impl FnOnce(&KeyMaterial) -> Result<T, KeyError>,
    ) -> Result<T, KeyError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let key = keys
            .get(alias)
            .ok_or_else(|| KeyError::NotFound(alias.to_string()))?;
        f(key)
    }
}

impl KeyStore for FileKeyStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn generate_key(&self, alias: &str) -> Result<(), KeyError> {
        validate_alias(alias)?;
        self.mutate(|keys| {
            if keys.contains_key(alias) {
                return Ok(false);
            }
            keys.insert(alias.to_string(), KeyMaterial::generate());
            debug!(alias, "generated key");
            Ok(true)
        })
    }

    fn import_key(&self, alias: &str, material: &[u8]) -> Result<(), KeyError> {
        validate_alias(alias)?;
        let material = KeyMaterial::from_slice(material)?;
        self.mutate(|keys| {
            if keys.contains_key(alias) {
                return Err(KeyError::AlreadyExists(alias.to_string()));
            }
            keys.insert(alias.to_string(), material);
            debug!(alias, "imported key");
            Ok(true)
        })
    }

    fn key_exists(&self, alias: &str) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(alias)
    }

    fn delete_key(&self, alias: &str) -> Result<(), KeyError> {
        self.mutate(|keys| {
            let removed = keys.remove(alias).is_some();
            if removed {
                debug!(alias, "deleted key");
            }
            Ok(removed)
        })
    }

    fn list_keys(&self) -> Vec<String> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn seal(
        &self,
        alias: &str,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeyError> {
        self.with_key(alias, |key| key.seal(nonce, aad, plaintext))
    }

    fn open(
        &self,
        alias: &str,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, KeyError> {
        self.with_key(alias, |key| key.open(nonce, aad, ciphertext))
    }

    fn mac(&self, alias: &str, data: &[u8]) -> Result<[u8; MAC_SIZE], KeyError> {
        self.with_key(alias, |key| key.mac(data))
    }

    fn verify_mac(&self, alias: &str, data: &[u8], tag: &[u8]) -> Result<bool, KeyError> {
        self.with_key(alias, |key| key.verify_mac(data, tag))
    }
}

impl Component for FileKeyStore {
    fn name(&self) -> &'static str {
        "keystore"
    }

    fn status(&self) -> ComponentStatus {
        ComponentStatus {
            name: self.name().to_string(),
            healthy: !self.keys.is_poisoned() && self.path.exists(),
            stats: ComponentStats::KeyStore {
                backend: self.backend().to_string(),
                keys: self.list_keys().len(),
            },
        }
    }
}

/// Derive the vault wrap key from a passphrase using Argon2id
fn derive_wrap_key(
    passphrase: &str,
    salt: &[u8; SALT_SIZE],
    kdf: &KdfParams,
) -> Result<KeyMaterial, KeyError> {
    if passphrase.is_empty() {
        return Err(KeyError::InvalidMaterial(
            "passphrase must not be empty".to_string(),
        ));
    }

    let params = argon2::Params::new(
        kdf.memory_kib,
        kdf.iterations,
        kdf.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| KeyError::Storage(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
        .map_err(|e| KeyError::Storage(format!("Key derivation failed: {}", e)))?;

    KeyMaterial::from_slice(&key[..])
}

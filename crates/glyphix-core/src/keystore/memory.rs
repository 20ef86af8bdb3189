//! In-memory key store

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use super::{validate_alias, KeyMaterial, KeyStore};
use crate::component::{Component, ComponentStats, ComponentStatus};
use crate::error::KeyError;
use crate::MAC_SIZE;

/// Process-local key store
///
/// Keys live only as long as the store and are zeroized when dropped.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: RwLock<BTreeMap<String, KeyMaterial>>,
}

impl MemoryKeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
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

impl KeyStore for MemoryKeyStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn generate_key(&self, alias: &str) -> Result<(), KeyError> {
        validate_alias(alias)?;

        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if !keys.contains_key(alias) {
            keys.insert(alias.to_string(), KeyMaterial::generate());
            debug!(alias, "generated key");
        }
        Ok(())
    }

    fn import_key(&self, alias: &str, material: &[u8]) -> Result<(), KeyError> {
        validate_alias(alias)?;
        let material = KeyMaterial::from_slice(material)?;

        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.contains_key(alias) {
            return Err(KeyError::AlreadyExists(alias.to_string()));
        }
        keys.insert(alias.to_string(), material);
        debug!(alias, "imported key");
        Ok(())
    }

    fn key_exists(&self, alias: &str) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(alias)
    }

    fn delete_key(&self, alias: &str) -> Result<(), KeyError> {
        let removed = self
            .keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(alias);
        if removed.is_some() {
            debug!(alias, "deleted key");
        }
        Ok(())
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

impl Component for MemoryKeyStore {
    fn name(&self) -> &'static str {
        "keystore"
    }

    fn status(&self) -> ComponentStatus {
        ComponentStatus {
            name: self.name().to_string(),
            healthy: !self.keys.is_poisoned(),
            stats: ComponentStats::KeyStore {
                backend: self.backend().to_string(),
                keys: self.list_keys().len(),
            },
        }
    }
}

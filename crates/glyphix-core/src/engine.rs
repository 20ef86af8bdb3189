//! Local encryption engine
//!
//! Authenticated encryption of content under a named key. Every call uses a
//! fresh random nonce, and the key alias is bound into the AEAD associated
//! data so a blob can only ever be opened under the alias it was sealed with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::component::{Component, ComponentStats, ComponentStatus};
use crate::error::{DecryptError, EncryptError};
use crate::keystore::KeyStore;
use crate::types::hex_bytes;
use crate::NONCE_SIZE;

/// Ciphertext together with the alias and nonce needed to open it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "hex_bytes")]
    ciphertext: Vec<u8>,
    key_alias: String,
    #[serde(with = "hex_bytes")]
    nonce: Vec<u8>,
}

impl EncryptedBlob {
    /// Rebuild a blob from persisted parts
    pub fn from_parts(ciphertext: Vec<u8>, key_alias: String, nonce: Vec<u8>) -> Self {
        Self {
            ciphertext,
            key_alias,
            nonce,
        }
    }

    /// Ciphertext including the authentication tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Alias of the key this blob was sealed with
    pub fn key_alias(&self) -> &str {
        &self.key_alias
    }

    /// Per-encryption nonce
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Size of the ciphertext in bytes
    pub fn len(&self) -> usize {
        self.ciphertext.len()
    }

    /// Whether the ciphertext is empty
    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

/// Encrypt/decrypt capability the access gate delegates to
pub trait ContentCipher: Send + Sync {
    /// Encrypt `plaintext` under `alias`
    fn encrypt(&self, plaintext: &[u8], alias: &str) -> Result<EncryptedBlob, EncryptError>;

    /// Decrypt `blob` with the key under `alias`
    fn decrypt(&self, blob: &EncryptedBlob, alias: &str)
        -> Result<Zeroizing<Vec<u8>>, DecryptError>;
}

#[derive(Default)]
struct EngineCounters {
    encryptions: AtomicU64,
    decryptions: AtomicU64,
    authentication_failures: AtomicU64,
    alias_mismatches: AtomicU64,
}

/// Encryption engine backed by a [`KeyStore`]
pub struct EncryptionEngine<S: ?Sized> {
    store: Arc<S>,
    counters: EngineCounters,
}

impl<S: KeyStore + ?Sized> EncryptionEngine<S> {
    /// Create an engine over a shared key store
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            counters: EngineCounters::default(),
        }
    }

    /// The underlying key store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Encrypt `plaintext` under the key named `alias`
    pub fn encrypt(&self, plaintext: &[u8], alias: &str) -> Result<EncryptedBlob, EncryptError> {
        if !self.store.key_exists(alias) {
            return Err(EncryptError::KeyNotFound(alias.to_string()));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .store
            .seal(alias, &nonce, alias.as_bytes(), plaintext)?;

        self.counters.encryptions.fetch_add(1, Ordering::Relaxed);
        debug!(alias, bytes = plaintext.len(), "encrypted content");

        Ok(EncryptedBlob {
            ciphertext,
            key_alias: alias.to_string(),
            nonce: nonce.to_vec(),
        })
    }

    /// Decrypt `blob` with the key named `alias`
    ///
    /// The alias check happens before any cryptographic work: a blob sealed
    /// under another alias is rejected even if `alias` names a valid key.
    pub fn decrypt(
        &self,
        blob: &EncryptedBlob,
        alias: &str,
    ) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
        if blob.key_alias != alias {
            self.counters.alias_mismatches.fetch_add(1, Ordering::Relaxed);
            warn!(
                requested = alias,
                bound = %blob.key_alias,
                "refusing to decrypt blob bound to another alias"
            );
            return Err(DecryptError::KeyAliasMismatch {
                expected: alias.to_string(),
                actual: blob.key_alias.clone(),
            });
        }

        if !self.store.key_exists(alias) {
            return Err(DecryptError::KeyNotFound(alias.to_string()));
        }

        match self
            .store
            .open(alias, &blob.nonce, alias.as_bytes(), &blob.ciphertext)
        {
            Ok(plaintext) => {
                self.counters.decryptions.fetch_add(1, Ordering::Relaxed);
                debug!(alias, "decrypted content");
                Ok(Zeroizing::new(plaintext))
            }
            Err(e) => {
                let e = DecryptError::from(e);
                if matches!(e, DecryptError::AuthenticationFailed) {
                    self.counters
                        .authentication_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(alias, "ciphertext failed authentication");
                }
                Err(e)
            }
        }
    }

    /// Decrypt under `old_alias` and encrypt the plaintext under `new_alias`
    ///
    /// Nothing is produced if decryption fails; the source blob is untouched
    /// either way.
    pub fn reencrypt(
        &self,
        blob: &EncryptedBlob,
        old_alias: &str,
        new_alias: &str,
    ) -> Result<EncryptedBlob, EncryptError> {
        let plaintext = self.decrypt(blob, old_alias)?;
        self.encrypt(&plaintext, new_alias)
    }
}

impl<S: KeyStore + ?Sized> ContentCipher for EncryptionEngine<S> {
    fn encrypt(&self, plaintext: &[u8], alias: &str) -> Result<EncryptedBlob, EncryptError> {
        EncryptionEngine::encrypt(self, plaintext, alias)
    }

    fn decrypt(
        &self,
        blob: &EncryptedBlob,
        alias: &str,
    ) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
        EncryptionEngine::decrypt(self, blob, alias)
    }
}

impl<S: KeyStore + ?Sized> Component for EncryptionEngine<S> {
    fn name(&self) -> &'static str {
        "encryption-engine"
    }

    fn status(&self) -> ComponentStatus {
        ComponentStatus {
            name: self.name().to_string(),
            healthy: true,
            stats: ComponentStats::Engine {
                encryptions: self.counters.encryptions.load(Ordering::Relaxed),
                decryptions: self.counters.decryptions.load(Ordering::Relaxed),
                authentication_failures: self
                    .counters
                    .authentication_failures
                    .load(Ordering::Relaxed),
                alias_mismatches: self.counters.alias_mismatches.load(Ordering::Relaxed),
            },
        }
    }
}

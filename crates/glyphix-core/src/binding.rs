//! Glyph-locked content binding
//!
//! Each resource gets its own key, named by an alias derived from the
//! resource id. Deleting that key crypto-shreds every ciphertext bound to the
//! resource, wherever copies of it live.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::component::{Component, ComponentStats, ComponentStatus};
use crate::engine::{EncryptedBlob, EncryptionEngine};
use crate::error::BindingError;
use crate::keystore::KeyStore;

/// Prefix of every resource key alias
pub const RESOURCE_ALIAS_PREFIX: &str = "glyph.";

const RESOURCE_ALIAS_DOMAIN: &[u8] = b"glyphix/resource-key/v1";

/// Hex characters of the resource digest kept in the alias
const RESOURCE_ALIAS_HEX_LEN: usize = 32;

/// Alias of the key bound to `resource_id`
///
/// Deterministic: the same resource id always maps to the same alias, and
/// arbitrary ids map to valid key-store aliases.
pub fn derive_resource_key_alias(resource_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(RESOURCE_ALIAS_DOMAIN);
    hasher.update(resource_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", RESOURCE_ALIAS_PREFIX, &digest[..RESOURCE_ALIAS_HEX_LEN])
}

/// Encrypted content bound to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphBinding {
    /// Resource identity the content is bound to
    pub resource_id: String,
    /// Ciphertext, absent until content is attached
    pub encrypted: Option<EncryptedBlob>,
    /// When content was last attached
    pub attached_at: Option<DateTime<Utc>>,
    /// Plaintext size in bytes
    pub content_size: usize,
}

impl GlyphBinding {
    /// Binding with no content yet
    pub fn empty(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            encrypted: None,
            attached_at: None,
            content_size: 0,
        }
    }

    /// Whether content is attached
    pub fn is_attached(&self) -> bool {
        self.encrypted.is_some()
    }
}

#[derive(Default)]
struct BindingCounters {
    attached: AtomicU64,
    unlocked: AtomicU64,
    rotated: AtomicU64,
    shredded: AtomicU64,
}

/// Binds content to per-resource keys
pub struct GlyphLock<S: ?Sized> {
    engine: Arc<EncryptionEngine<S>>,
    counters: BindingCounters,
}

impl<S: KeyStore + ?Sized> GlyphLock<S> {
    /// Create a binder over a shared engine
    pub fn new(engine: Arc<EncryptionEngine<S>>) -> Self {
        Self {
            engine,
            counters: BindingCounters::default(),
        }
    }

    /// Encrypt `plaintext` under the resource's key, creating it if needed
    pub fn attach(&self, resource_id: &str, plaintext: &[u8]) -> Result<GlyphBinding, BindingError> {
        let binding = self.seal(resource_id, plaintext)?;
        self.counters.attached.fetch_add(1, Ordering::Relaxed);
        Ok(binding)
    }

    /// Decrypt the content of `binding`
    pub fn unlock(
        &self,
        resource_id: &str,
        binding: &GlyphBinding,
    ) -> Result<Zeroizing<Vec<u8>>, BindingError> {
        let plaintext = self.open(resource_id, binding)?;
        self.counters.unlocked.fetch_add(1, Ordering::Relaxed);
        Ok(plaintext)
    }

    /// Re-key the resource and re-encrypt its content
    ///
    /// If the content cannot be unlocked nothing is deleted. Failures after
    /// the old key is gone are returned as-is; the plaintext is not retained.
    pub fn rotate(
        &self,
        resource_id: &str,
        binding: &GlyphBinding,
    ) -> Result<GlyphBinding, BindingError> {
        let plaintext = self.open(resource_id, binding)?;

        let alias = derive_resource_key_alias(resource_id);
        self.engine.store().delete_key(&alias)?;
        let rotated = self.seal(resource_id, &plaintext)?;

        self.counters.rotated.fetch_add(1, Ordering::Relaxed);
        info!(resource = resource_id, "rotated resource key");
        Ok(rotated)
    }

    /// Delete the resource's key, making its ciphertext unrecoverable
    ///
    /// Returns whether a key existed.
    pub fn delete(&self, resource_id: &str) -> Result<bool, BindingError> {
        let alias = derive_resource_key_alias(resource_id);
        let existed = self.engine.store().key_exists(&alias);
        self.engine.store().delete_key(&alias)?;

        if existed {
            self.counters.shredded.fetch_add(1, Ordering::Relaxed);
            info!(resource = resource_id, "crypto-shredded resource");
        }
        Ok(existed)
    }

    fn seal(&self, resource_id: &str, plaintext: &[u8]) -> Result<GlyphBinding, BindingError> {
        let alias = derive_resource_key_alias(resource_id);
        self.engine.store().generate_key(&alias)?;

        let encrypted = self.engine.encrypt(plaintext, &alias)?;
        debug!(resource = resource_id, alias = %alias, "sealed content");

        Ok(GlyphBinding {
            resource_id: resource_id.to_string(),
            encrypted: Some(encrypted),
            attached_at: Some(Utc::now()),
            content_size: plaintext.len(),
        })
    }

    fn open(
        &self,
        resource_id: &str,
        binding: &GlyphBinding,
    ) -> Result<Zeroizing<Vec<u8>>, BindingError> {
        if binding.resource_id != resource_id {
            return Err(BindingError::ResourceMismatch {
                expected: resource_id.to_string(),
                actual: binding.resource_id.clone(),
            });
        }

        let blob = binding
            .encrypted
            .as_ref()
            .ok_or_else(|| BindingError::NoContentAttached(resource_id.to_string()))?;

        let alias = derive_resource_key_alias(resource_id);
        Ok(self.engine.decrypt(blob, &alias)?)
    }
}

impl<S: KeyStore + ?Sized> Component for GlyphLock<S> {
    fn name(&self) -> &'static str {
        "glyph-binding"
    }

    fn status(&self) -> ComponentStatus {
        ComponentStatus {
            name: self.name().to_string(),
            healthy: true,
            stats: ComponentStats::Binding {
                attached: self.counters.attached.load(Ordering::Relaxed),
                unlocked: self.counters.unlocked.load(Ordering::Relaxed),
                rotated: self.counters.rotated.load(Ordering::Relaxed),
                shredded: self.counters.shredded.load(Ordering::Relaxed),
            },
        }
    }
}

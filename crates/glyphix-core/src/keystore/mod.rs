//! Secure key storage abstraction
//!
//! A [`KeyStore`] generates, holds and deletes symmetric keys by alias and
//! performs every cryptographic operation with those keys itself, so raw key
//! bytes never reach callers. This mirrors how hardware-backed key stores
//! (secure elements, TEEs, HSMs) expose keys as handles.
//!
//! # Backends
//!
//! - [`MemoryKeyStore`] - process-local keys, lost on drop
//! - [`FileKeyStore`] - keys in a passphrase-encrypted vault file, for hosts
//!   without a secure element
//!
//! Every method may block on backend I/O.

mod file;
mod material;
mod memory;

pub use file::{FileKeyStore, KdfParams, VAULT_VERSION};
pub use material::KeyMaterial;
pub use memory::MemoryKeyStore;

use crate::error::KeyError;
use crate::MAC_SIZE;

/// Maximum alias length in bytes
pub const MAX_ALIAS_LENGTH: usize = 128;

/// Trait for secure key stores
///
/// `generate_key` and `delete_key` are idempotent. `list_keys` returns a
/// sorted snapshot taken at call time.
pub trait KeyStore: Send + Sync {
    /// Short backend name for status reporting
    fn backend(&self) -> &'static str;

    /// Generate a key under `alias` unless one already exists
    fn generate_key(&self, alias: &str) -> Result<(), KeyError>;

    /// Install externally supplied key material under a new alias
    ///
    /// Fails with [`KeyError::AlreadyExists`] instead of overwriting.
    fn import_key(&self, alias: &str, material: &[u8]) -> Result<(), KeyError>;

    /// Whether a key exists under `alias`
    fn key_exists(&self, alias: &str) -> bool;

    /// Delete the key under `alias`; deleting a missing key succeeds
    fn delete_key(&self, alias: &str) -> Result<(), KeyError>;

    /// Snapshot of all aliases
    fn list_keys(&self) -> Vec<String>;

    /// Authenticated encryption with the key under `alias`
    fn seal(
        &self,
        alias: &str,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeyError>;

    /// Authenticated decryption with the key under `alias`
    fn open(
        &self,
        alias: &str,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, KeyError>;

    /// HMAC-SHA256 with the key under `alias`
    fn mac(&self, alias: &str, data: &[u8]) -> Result<[u8; MAC_SIZE], KeyError>;

    /// Constant-time HMAC-SHA256 verification with the key under `alias`
    fn verify_mac(&self, alias: &str, data: &[u8], tag: &[u8]) -> Result<bool, KeyError>;
}

/// Check that an alias is usable as a key handle
///
/// Aliases are non-empty, at most [`MAX_ALIAS_LENGTH`] bytes, and limited to
/// ASCII alphanumerics and `.`, `_`, `-`, `:`.
pub fn validate_alias(alias: &str) -> Result<(), KeyError> {
    if alias.is_empty() || alias.len() > MAX_ALIAS_LENGTH {
        return Err(KeyError::InvalidAlias(alias.to_string()));
    }

    let valid = alias
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b':'));

    if !valid {
        return Err(KeyError::InvalidAlias(alias.to_string()));
    }

    Ok(())
}

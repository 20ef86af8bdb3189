//! Error types for the GLyphIX key management core
//!
//! Each component has its own error enum so callers can match on the exact
//! failure kind. Every error also reports a [`FailureClass`], which lets a UI
//! tell "access denied, change context and retry" apart from "the data is
//! corrupted and lost" without inspecting messages.

use thiserror::Error;

use crate::sharding::FactorType;

/// Result type alias for operations that span several components
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a failure, for user-facing remediation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Conditions for access are not met (presence mismatch, missing factors)
    AccessDenied,
    /// Ciphertext, nonce, shard or vault failed an integrity check
    DataCorruption,
    /// The key needed for the operation does not exist (never created, or shredded)
    MissingKey,
    /// The key storage backend failed (I/O, poisoned state)
    Storage,
    /// The caller supplied something malformed or inconsistent
    InvalidInput,
}

/// Errors raised by [`KeyStore`](crate::keystore::KeyStore) implementations
#[derive(Debug, Error)]
pub enum KeyError {
    /// No key is stored under the alias
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A key already exists under the alias and would be overwritten
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// Alias is empty, too long, or contains unsupported characters
    #[error("Invalid key alias: {0:?}")]
    InvalidAlias(String),

    /// Imported key material has the wrong shape
    #[error("Invalid key material: {0}")]
    InvalidMaterial(String),

    /// AEAD open failed (tampered ciphertext or nonce, or wrong key)
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Vault could not be decrypted (wrong passphrase or corrupted file)
    #[error("Vault locked - wrong passphrase or corrupted vault file")]
    VaultLocked,

    /// Backend failure that is not an I/O error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeyError {
    /// Classify this failure
    pub fn class(&self) -> FailureClass {
        match self {
            KeyError::NotFound(_) => FailureClass::MissingKey,
            KeyError::AlreadyExists(_)
            | KeyError::InvalidAlias(_)
            | KeyError::InvalidMaterial(_) => FailureClass::InvalidInput,
            KeyError::AuthenticationFailed => FailureClass::DataCorruption,
            KeyError::VaultLocked => FailureClass::AccessDenied,
            KeyError::Storage(_) | KeyError::Io(_) => FailureClass::Storage,
        }
    }
}

/// Errors raised while encrypting
#[derive(Debug, Error)]
pub enum EncryptError {
    /// The alias does not name an existing key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Re-encryption could not decrypt the source blob
    #[error("Decryption failed during re-encryption: {0}")]
    Decrypt(#[from] DecryptError),

    /// Key storage failure
    #[error("Key store error: {0}")]
    KeyStore(KeyError),
}

impl From<KeyError> for EncryptError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::NotFound(alias) => EncryptError::KeyNotFound(alias),
            other => EncryptError::KeyStore(other),
        }
    }
}

impl EncryptError {
    /// Classify this failure
    pub fn class(&self) -> FailureClass {
        match self {
            EncryptError::KeyNotFound(_) => FailureClass::MissingKey,
            EncryptError::Decrypt(e) => e.class(),
            EncryptError::KeyStore(e) => e.class(),
        }
    }
}

/// Errors raised while decrypting
#[derive(Debug, Error)]
pub enum DecryptError {
    /// The blob was produced under a different alias than the one requested
    #[error("Key alias mismatch: blob is bound to {actual:?}, requested {expected:?}")]
    KeyAliasMismatch {
        /// Alias the caller asked to decrypt with
        expected: String,
        /// Alias recorded in the blob
        actual: String,
    },

    /// The alias does not name an existing key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Ciphertext or nonce was tampered with, or the key is wrong
    #[error("Authentication failed - ciphertext or nonce rejected")]
    AuthenticationFailed,

    /// Key storage failure
    #[error("Key store error: {0}")]
    KeyStore(KeyError),
}

impl From<KeyError> for DecryptError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::NotFound(alias) => DecryptError::KeyNotFound(alias),
            KeyError::AuthenticationFailed => DecryptError::AuthenticationFailed,
            other => DecryptError::KeyStore(other),
        }
    }
}

impl DecryptError {
    /// Classify this failure
    pub fn class(&self) -> FailureClass {
        match self {
            DecryptError::KeyAliasMismatch { .. } => FailureClass::InvalidInput,
            DecryptError::KeyNotFound(_) => FailureClass::MissingKey,
            DecryptError::AuthenticationFailed => FailureClass::DataCorruption,
            DecryptError::KeyStore(e) => e.class(),
        }
    }
}

/// Errors raised by key splitting and reconstruction
#[derive(Debug, Error)]
pub enum ShardError {
    /// Fewer shards than the threshold were supplied
    #[error("Insufficient shards: {provided} provided, {required} required")]
    InsufficientShards {
        /// Threshold of the shard set
        required: usize,
        /// Number of shards supplied
        provided: usize,
    },

    /// A shard's integrity tag did not verify
    #[error("Integrity violation in shard {shard_id}")]
    IntegrityViolation {
        /// Identifier of the offending shard
        shard_id: String,
    },

    /// The same factor contributed more than one shard
    #[error("Duplicate shard factor: {0}")]
    DuplicateShardFactor(FactorType),

    /// Shards come from different split operations
    #[error("Shards belong to different shard sets")]
    MixedShardSets,

    /// Threshold is zero or larger than the number of shards
    #[error("Invalid threshold {threshold} for {shards} shards")]
    InvalidThreshold {
        /// Requested threshold
        threshold: usize,
        /// Requested number of shards
        shards: usize,
    },

    /// Attempted to split an empty secret
    #[error("Cannot split an empty secret")]
    EmptySecret,

    /// Shard bytes or encoding could not be parsed or combined
    #[error("Malformed shard: {0}")]
    Malformed(String),

    /// Key storage failure (integrity key)
    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyError),
}

impl ShardError {
    /// Classify this failure
    pub fn class(&self) -> FailureClass {
        match self {
            ShardError::InsufficientShards { .. } | ShardError::DuplicateShardFactor(_) => {
                FailureClass::AccessDenied
            }
            ShardError::IntegrityViolation { .. } => FailureClass::DataCorruption,
            ShardError::MixedShardSets
            | ShardError::InvalidThreshold { .. }
            | ShardError::EmptySecret
            | ShardError::Malformed(_) => FailureClass::InvalidInput,
            ShardError::KeyStore(e) => e.class(),
        }
    }
}

/// Errors raised by the presence-bound access gate
#[derive(Debug, Error)]
pub enum AccessError {
    /// Current presence does not satisfy the resource's requirement
    #[error("Presence denied: {0}")]
    PresenceDenied(String),

    /// Presence matched but decryption failed
    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    /// Presence matched but reconstruction failed
    #[error(transparent)]
    Shard(#[from] ShardError),
}

impl AccessError {
    /// Classify this failure
    pub fn class(&self) -> FailureClass {
        match self {
            AccessError::PresenceDenied(_) => FailureClass::AccessDenied,
            AccessError::Decrypt(e) => e.class(),
            AccessError::Shard(e) => e.class(),
        }
    }
}

/// Errors raised by glyph-locked content bindings
#[derive(Debug, Error)]
pub enum BindingError {
    /// The binding has no encrypted content
    #[error("No content attached to resource {0}")]
    NoContentAttached(String),

    /// The binding belongs to another resource
    #[error("Binding belongs to resource {actual:?}, not {expected:?}")]
    ResourceMismatch {
        /// Resource the caller asked for
        expected: String,
        /// Resource recorded in the binding
        actual: String,
    },

    /// Key lifecycle failure
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Encryption failure
    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    /// Decryption failure
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

impl BindingError {
    /// Classify this failure
    pub fn class(&self) -> FailureClass {
        match self {
            BindingError::NoContentAttached(_) => FailureClass::MissingKey,
            BindingError::ResourceMismatch { .. } => FailureClass::InvalidInput,
            BindingError::Key(e) => e.class(),
            BindingError::Encrypt(e) => e.class(),
            BindingError::Decrypt(e) => e.class(),
        }
    }
}

/// Crate-wide error
#[derive(Debug, Error)]
pub enum Error {
    /// Key store error
    #[error("Key store error: {0}")]
    Key(#[from] KeyError),

    /// Encryption error
    #[error("Encryption error: {0}")]
    Encrypt(#[from] EncryptError),

    /// Decryption error
    #[error("Decryption error: {0}")]
    Decrypt(#[from] DecryptError),

    /// Sharding error
    #[error("Shard error: {0}")]
    Shard(#[from] ShardError),

    /// Access gate error
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    /// Binding error
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this failure
    pub fn class(&self) -> FailureClass {
        match self {
            Error::Key(e) => e.class(),
            Error::Encrypt(e) => e.class(),
            Error::Decrypt(e) => e.class(),
            Error::Shard(e) => e.class(),
            Error::Access(e) => e.class(),
            Error::Binding(e) => e.class(),
            Error::Config(_) | Error::Serialization(_) => FailureClass::InvalidInput,
            Error::Io(_) => FailureClass::Storage,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

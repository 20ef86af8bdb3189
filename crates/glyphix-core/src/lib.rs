//! GLyphIX Core - Presence-bound multi-factor key management
//!
//! This crate provides:
//! - A key store abstraction with in-memory and vault-file backends
//! - Authenticated encryption of content under named keys
//! - Shamir k-of-N splitting of master keys across authentication factors
//! - A presence-bound access gate with an append-only audit log
//! - Per-resource key binding with crypto-shredding

pub mod audit;
pub mod binding;
pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod keystore;
pub mod presence;
pub mod sharding;
pub mod types;

pub use audit::{AccessAttempt, AccessLog};
pub use binding::{derive_resource_key_alias, GlyphBinding, GlyphLock};
pub use component::{Component, ComponentStats, ComponentStatus};
pub use config::GlyphixConfig;
pub use engine::{ContentCipher, EncryptedBlob, EncryptionEngine};
pub use error::{
    AccessError, BindingError, DecryptError, EncryptError, Error, FailureClass, KeyError,
    Result, ShardError,
};
pub use gate::{PresenceDecision, PresenceGate};
pub use keystore::{FileKeyStore, KdfParams, KeyStore, MemoryKeyStore};
pub use presence::{
    EmotionalTone, FocusLevel, PresenceMode, PresenceRequirement, PresenceState, SocialContext,
};
pub use sharding::{
    collect_shards, FactorType, KeyShard, MasterKey, ShardManager, ShardPolicy, ShardProvider,
    StaticShardProvider, SHARD_INTEGRITY_ALIAS,
};

/// Symmetric key size in bytes
pub const KEY_SIZE: usize = 32;

/// AEAD nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// HMAC-SHA256 tag size in bytes
pub const MAC_SIZE: usize = 32;

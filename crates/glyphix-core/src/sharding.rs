//! Multi-factor key sharding
//!
//! A master key is split with Shamir's Secret Sharing over GF(256) into one
//! shard per authentication factor. Any `threshold` shards reconstruct the
//! key; fewer reveal nothing about it.
//!
//! # Integrity
//!
//! Every shard carries an HMAC-SHA256 tag computed with a key-store-held
//! integrity key over a canonical encoding of all its fields. Reconstruction
//! verifies every tag before combining anything, so a corrupted or relabelled
//! shard is reported by id instead of silently producing a wrong key.
//!
//! # Default Policy
//!
//! 3-of-3 over `{Device, Presence, Biometric}`: all three independently
//! sourced factors must be present. Losing one factor makes the key
//! unrecoverable until it is re-provisioned out of band.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sharks::{Share, Sharks};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::component::{Component, ComponentStats, ComponentStatus};
use crate::error::ShardError;
use crate::keystore::KeyStore;
use crate::types::{hex_array, hex_bytes};
use crate::{KEY_SIZE, MAC_SIZE};

/// Alias of the key-store key that authenticates shards
pub const SHARD_INTEGRITY_ALIAS: &str = "glyphix.shard-integrity";

/// Compact shard encoding version
pub const SHARD_FORMAT_VERSION: u8 = 1;

const TAG_DOMAIN: &[u8] = b"glyphix/shard/v1";

/// Independent authentication factor contributing one shard
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactorType {
    /// Device-bound secret (hardware key store)
    Device,
    /// Presence verification
    Presence,
    /// Biometric enrollment
    Biometric,
}

impl FactorType {
    /// All factor types, in default policy order
    pub const ALL: [FactorType; 3] = [
        FactorType::Device,
        FactorType::Presence,
        FactorType::Biometric,
    ];

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorType::Device => "device",
            FactorType::Presence => "presence",
            FactorType::Biometric => "biometric",
        }
    }

    fn code(&self) -> u8 {
        match self {
            FactorType::Device => 1,
            FactorType::Presence => 2,
            FactorType::Biometric => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FactorType::Device),
            2 => Some(FactorType::Presence),
            3 => Some(FactorType::Biometric),
            _ => None,
        }
    }
}

impl std::fmt::Display for FactorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactorType {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "device" => Ok(FactorType::Device),
            "presence" => Ok(FactorType::Presence),
            "biometric" => Ok(FactorType::Biometric),
            other => Err(ShardError::Malformed(format!("unknown factor {:?}", other))),
        }
    }
}

/// Threshold and factor set used for splitting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPolicy {
    /// Shards required to reconstruct
    pub threshold: usize,
    /// One shard is produced per factor, in this order
    pub factors: Vec<FactorType>,
}

impl Default for ShardPolicy {
    fn default() -> Self {
        Self {
            threshold: 3,
            factors: FactorType::ALL.to_vec(),
        }
    }
}

impl ShardPolicy {
    /// Create a policy
    pub fn new(threshold: usize, factors: Vec<FactorType>) -> Self {
        Self { threshold, factors }
    }

    /// Check threshold bounds and factor uniqueness
    pub fn validate(&self) -> Result<(), ShardError> {
        if self.threshold == 0 || self.threshold > self.factors.len() {
            return Err(ShardError::InvalidThreshold {
                threshold: self.threshold,
                shards: self.factors.len(),
            });
        }

        let mut seen = HashSet::new();
        for factor in &self.factors {
            if !seen.insert(*factor) {
                return Err(ShardError::DuplicateShardFactor(*factor));
            }
        }
        Ok(())
    }
}

/// Reconstructed or freshly generated master key (zeroized on drop)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    /// Wrap existing key bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Generate a random 256-bit master key
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey([REDACTED; {}])", self.0.len())
    }
}

/// One factor's share of a master key
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyShard {
    /// Identifier shared by all shards of one split
    pub set_id: String,
    /// Unique shard identifier (`<set_id>-<index>`)
    pub shard_id: String,
    /// Factor this shard belongs to
    #[zeroize(skip)]
    pub factor: FactorType,
    /// Shamir x-coordinate
    pub index: u8,
    /// Shards required to reconstruct
    pub threshold: u8,
    /// Shamir share bytes
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    /// HMAC-SHA256 over every other field
    #[serde(with = "hex_array")]
    pub integrity_tag: [u8; MAC_SIZE],
}

impl KeyShard {
    /// Canonical bytes covered by the integrity tag
    fn tag_input(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            TAG_DOMAIN.len() + self.set_id.len() + self.shard_id.len() + self.payload.len() + 16,
        );
        out.extend_from_slice(TAG_DOMAIN);
        out.extend_from_slice(&(self.set_id.len() as u32).to_be_bytes());
        out.extend_from_slice(self.set_id.as_bytes());
        out.extend_from_slice(&(self.shard_id.len() as u32).to_be_bytes());
        out.extend_from_slice(self.shard_id.as_bytes());
        out.push(self.factor.code());
        out.push(self.index);
        out.push(self.threshold);
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Encode to the compact binary form
    ///
    /// Layout: version, factor, index, threshold (1 byte each), set id
    /// (1-byte length + bytes), payload (2-byte big-endian length + bytes),
    /// 32-byte tag. The shard id is implied by set id and index.
    ///
    /// Fails with `Malformed` when the set id or payload exceeds its
    /// length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ShardError> {
        let set_len = u8::try_from(self.set_id.len())
            .map_err(|_| ShardError::Malformed("set id too long".to_string()))?;
        let payload_len = u16::try_from(self.payload.len())
            .map_err(|_| ShardError::Malformed("payload too long".to_string()))?;

        let mut out = Vec::with_capacity(7 + self.set_id.len() + self.payload.len() + MAC_SIZE);
        out.push(SHARD_FORMAT_VERSION);
        out.push(self.factor.code());
        out.push(self.index);
        out.push(self.threshold);
        out.push(set_len);
        out.extend_from_slice(self.set_id.as_bytes());
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.integrity_tag);
        Ok(out)
    }

    /// Decode the compact binary form
    ///
    /// Only the structure is checked here; authenticity is checked by
    /// [`ShardManager::verify_shard`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ShardError> {
        let malformed = |msg: &str| ShardError::Malformed(msg.to_string());

        if bytes.len() < 5 {
            return Err(malformed("shard too short"));
        }
        if bytes[0] != SHARD_FORMAT_VERSION {
            return Err(ShardError::Malformed(format!(
                "unsupported shard version {}",
                bytes[0]
            )));
        }

        let factor = FactorType::from_code(bytes[1]).ok_or_else(|| malformed("unknown factor"))?;
        let index = bytes[2];
        let threshold = bytes[3];
        let set_len = bytes[4] as usize;

        let mut pos = 5;
        let set_bytes = bytes
            .get(pos..pos + set_len)
            .ok_or_else(|| malformed("truncated set id"))?;
        let set_id = std::str::from_utf8(set_bytes)
            .map_err(|_| malformed("set id is not utf-8"))?
            .to_string();
        pos += set_len;

        let len_bytes = bytes
            .get(pos..pos + 2)
            .ok_or_else(|| malformed("truncated payload length"))?;
        let payload_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        pos += 2;

        let payload = bytes
            .get(pos..pos + payload_len)
            .ok_or_else(|| malformed("truncated payload"))?
            .to_vec();
        pos += payload_len;

        let tag_bytes = bytes
            .get(pos..)
            .filter(|rest| rest.len() == MAC_SIZE)
            .ok_or_else(|| malformed("integrity tag must be 32 bytes"))?;
        let mut integrity_tag = [0u8; MAC_SIZE];
        integrity_tag.copy_from_slice(tag_bytes);

        Ok(Self {
            shard_id: shard_id_for(&set_id, index),
            set_id,
            factor,
            index,
            threshold,
            payload,
            integrity_tag,
        })
    }

    /// Hex of the compact binary form
    pub fn to_hex(&self) -> Result<String, ShardError> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Parse from [`KeyShard::to_hex`] output
    pub fn from_hex(s: &str) -> Result<Self, ShardError> {
        let bytes = hex::decode(s.trim()).map_err(|e| ShardError::Malformed(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for KeyShard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShard")
            .field("shard_id", &self.shard_id)
            .field("factor", &self.factor)
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("payload", &"[REDACTED]")
            .finish()
    }
}

fn shard_id_for(set_id: &str, index: u8) -> String {
    format!("{}-{}", set_id, index)
}

/// Source of one factor's shard (device key store, presence verifier,
/// biometric subsystem)
pub trait ShardProvider: Send + Sync {
    /// Factor this provider speaks for
    fn factor(&self) -> FactorType;

    /// Produce this factor's shard of the given set
    fn provide(&self, set_id: &str) -> Result<KeyShard, ShardError>;
}

/// Provider that hands out a shard it already holds
pub struct StaticShardProvider {
    shard: KeyShard,
}

impl StaticShardProvider {
    /// Wrap a shard
    pub fn new(shard: KeyShard) -> Self {
        Self { shard }
    }
}

impl ShardProvider for StaticShardProvider {
    fn factor(&self) -> FactorType {
        self.shard.factor
    }

    fn provide(&self, set_id: &str) -> Result<KeyShard, ShardError> {
        if self.shard.set_id != set_id {
            return Err(ShardError::MixedShardSets);
        }
        Ok(self.shard.clone())
    }
}

/// Gather one shard per provider for `set_id`
///
/// Providers that fail, or that return a shard for a different factor, are
/// skipped; whether the remainder meets the threshold is decided by
/// reconstruction.
pub fn collect_shards(providers: &[&dyn ShardProvider], set_id: &str) -> Vec<KeyShard> {
    let mut shards = Vec::with_capacity(providers.len());
    for provider in providers {
        match provider.provide(set_id) {
            Ok(shard) if shard.factor == provider.factor() => shards.push(shard),
            Ok(shard) => warn!(
                expected = %provider.factor(),
                actual = %shard.factor,
                "provider returned a shard for another factor"
            ),
            Err(e) => warn!(factor = %provider.factor(), error = %e, "shard provider failed"),
        }
    }
    shards
}

#[derive(Default)]
struct ShardCounters {
    splits: AtomicU64,
    reconstructions: AtomicU64,
    rejections: AtomicU64,
}

/// Splits master keys into authenticated shards and reconstructs them
pub struct ShardManager<S: ?Sized> {
    store: Arc<S>,
    policy: ShardPolicy,
    counters: ShardCounters,
}

impl<S: KeyStore + ?Sized> ShardManager<S> {
    /// Create a manager, provisioning the integrity key if needed
    pub fn new(store: Arc<S>, policy: ShardPolicy) -> Result<Self, ShardError> {
        policy.validate()?;
        store.generate_key(SHARD_INTEGRITY_ALIAS)?;

        Ok(Self {
            store,
            policy,
            counters: ShardCounters::default(),
        })
    }

    /// Create a manager with the default 3-of-3 policy
    pub fn with_default_policy(store: Arc<S>) -> Result<Self, ShardError> {
        Self::new(store, ShardPolicy::default())
    }

    /// Default policy used by [`ShardManager::split_with_policy`]
    pub fn policy(&self) -> &ShardPolicy {
        &self.policy
    }

    /// Split with the manager's default policy
    pub fn split_with_policy(&self, master_key: &[u8]) -> Result<Vec<KeyShard>, ShardError> {
        let policy = self.policy.clone();
        self.split_key(master_key, policy.threshold, &policy.factors)
    }

    /// Split `master_key` into one shard per entry of `factors`
    pub fn split_key(
        &self,
        master_key: &[u8],
        threshold: usize,
        factors: &[FactorType],
    ) -> Result<Vec<KeyShard>, ShardError> {
        if master_key.is_empty() {
            return Err(ShardError::EmptySecret);
        }
        // Payload carries the x coordinate too, and must fit a u16 length
        if master_key.len() >= u16::MAX as usize {
            return Err(ShardError::Malformed("master key too long".to_string()));
        }
        ShardPolicy::new(threshold, factors.to_vec()).validate()?;

        let set_id = uuid::Uuid::new_v4().simple().to_string();
        let sharks = Sharks(threshold as u8);
        let dealer = sharks.dealer(master_key);

        let mut shards = Vec::with_capacity(factors.len());
        for (factor, share) in factors.iter().zip(dealer.take(factors.len())) {
            let payload: Vec<u8> = (&share).into();
            let index = payload[0];

            let mut shard = KeyShard {
                set_id: set_id.clone(),
                shard_id: shard_id_for(&set_id, index),
                factor: *factor,
                index,
                threshold: threshold as u8,
                payload,
                integrity_tag: [0u8; MAC_SIZE],
            };
            shard.integrity_tag = self.store.mac(SHARD_INTEGRITY_ALIAS, &shard.tag_input())?;
            shards.push(shard);
        }

        self.counters.splits.fetch_add(1, Ordering::Relaxed);
        info!(
            set_id = %set_id,
            threshold,
            shards = shards.len(),
            "split master key"
        );
        Ok(shards)
    }

    /// Check a single shard's integrity tag
    pub fn verify_shard(&self, shard: &KeyShard) -> Result<(), ShardError> {
        let valid = self.store.verify_mac(
            SHARD_INTEGRITY_ALIAS,
            &shard.tag_input(),
            &shard.integrity_tag,
        )?;

        if !valid {
            warn!(shard_id = %shard.shard_id, "shard failed integrity check");
            return Err(ShardError::IntegrityViolation {
                shard_id: shard.shard_id.clone(),
            });
        }
        Ok(())
    }

    /// Reconstruct the master key from `shards`
    ///
    /// Every tag is verified before anything is combined. Fails on a
    /// tampered shard, shards from different splits, a factor contributing
    /// twice, or fewer shards than the set's threshold.
    pub fn reconstruct_key(&self, shards: &[KeyShard]) -> Result<MasterKey, ShardError> {
        let result = self.try_reconstruct(shards);
        match &result {
            Ok(_) => {
                self.counters.reconstructions.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.rejections.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "key reconstruction rejected");
            }
        }
        result
    }

    fn try_reconstruct(&self, shards: &[KeyShard]) -> Result<MasterKey, ShardError> {
        let first = shards.first().ok_or(ShardError::InsufficientShards {
            required: self.policy.threshold,
            provided: 0,
        })?;

        for shard in shards {
            self.verify_shard(shard)?;
        }

        if shards
            .iter()
            .any(|s| s.set_id != first.set_id || s.threshold != first.threshold)
        {
            return Err(ShardError::MixedShardSets);
        }

        let mut factors = HashSet::new();
        let mut indices = HashSet::new();
        for shard in shards {
            if !factors.insert(shard.factor) {
                return Err(ShardError::DuplicateShardFactor(shard.factor));
            }
            if !indices.insert(shard.index) {
                return Err(ShardError::Malformed(format!(
                    "duplicate share index {}",
                    shard.index
                )));
            }
        }

        let required = first.threshold as usize;
        if shards.len() < required {
            return Err(ShardError::InsufficientShards {
                required,
                provided: shards.len(),
            });
        }

        let shares = shards
            .iter()
            .map(|s| {
                Share::try_from(s.payload.as_slice())
                    .map_err(|e| ShardError::Malformed(e.to_string()))
            })
            .collect::<Result<Vec<Share>, ShardError>>()?;

        let secret = Sharks(first.threshold)
            .recover(&shares)
            .map_err(|e| ShardError::Malformed(e.to_string()))?;

        debug!(set_id = %first.set_id, shards = shards.len(), "reconstructed master key");
        Ok(MasterKey::new(secret))
    }
}

impl<S: KeyStore + ?Sized> Component for ShardManager<S> {
    fn name(&self) -> &'static str {
        "sharding"
    }

    fn status(&self) -> ComponentStatus {
        ComponentStatus {
            name: self.name().to_string(),
            healthy: self.store.key_exists(SHARD_INTEGRITY_ALIAS),
            stats: ComponentStats::Sharding {
                threshold: self.policy.threshold,
                factors: self.policy.factors.len(),
                splits: self.counters.splits.load(Ordering::Relaxed),
                reconstructions: self.counters.reconstructions.load(Ordering::Relaxed),
                rejections: self.counters.rejections.load(Ordering::Relaxed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryKeyStore;

    fn manager() -> ShardManager<MemoryKeyStore> {
        ShardManager::with_default_policy(Arc::new(MemoryKeyStore::new())).unwrap()
    }

    fn by_factor(shards: &[KeyShard], factor: FactorType) -> KeyShard {
        shards.iter().find(|s| s.factor == factor).unwrap().clone()
    }

    #[test]
    fn test_default_policy_round_trip() {
        let manager = manager();
        let master = MasterKey::generate();

        let shards = manager.split_with_policy(master.as_bytes()).unwrap();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(|s| s.threshold == 3));
        assert_eq!(
            shards.iter().map(|s| s.factor).collect::<Vec<_>>(),
            FactorType::ALL.to_vec()
        );

        let recovered = manager.reconstruct_key(&shards).unwrap();
        assert_eq!(recovered.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_shard_order_does_not_matter() {
        let manager = manager();
        let master = MasterKey::generate();
        let mut shards = manager.split_with_policy(master.as_bytes()).unwrap();
        shards.reverse();

        let recovered = manager.reconstruct_key(&shards).unwrap();
        assert_eq!(recovered.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_two_of_three_is_insufficient() {
        let manager = manager();
        let shards = manager.split_with_policy(&[7u8; 32]).unwrap();

        let result = manager.reconstruct_key(&shards[..2]);
        match result {
            Err(ShardError::InsufficientShards { required, provided }) => {
                assert_eq!(required, 3);
                assert_eq!(provided, 2);
            }
            other => panic!("expected InsufficientShards, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_shards_insufficient() {
        let manager = manager();
        let result = manager.reconstruct_key(&[]);
        assert!(matches!(
            result,
            Err(ShardError::InsufficientShards {
                required: 3,
                provided: 0
            })
        ));
    }

    #[test]
    fn test_corrupted_tag_names_shard() {
        let manager = manager();
        let mut shards = manager.split_with_policy(&[7u8; 32]).unwrap();
        shards[1].integrity_tag[0] ^= 0xff;
        let bad_id = shards[1].shard_id.clone();

        match manager.reconstruct_key(&shards) {
            Err(ShardError::IntegrityViolation { shard_id }) => assert_eq!(shard_id, bad_id),
            other => panic!("expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let manager = manager();
        let mut shards = manager.split_with_policy(&[7u8; 32]).unwrap();
        let last = shards[2].payload.len() - 1;
        shards[2].payload[last] ^= 0x01;

        assert!(matches!(
            manager.reconstruct_key(&shards),
            Err(ShardError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn test_relabelled_factor_detected() {
        let manager = manager();
        let mut shards = manager.split_with_policy(&[7u8; 32]).unwrap();
        shards[0].factor = FactorType::Biometric;

        assert!(matches!(
            manager.reconstruct_key(&shards),
            Err(ShardError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn test_duplicate_factor_rejected() {
        let manager = manager();
        let shards = manager.split_with_policy(&[7u8; 32]).unwrap();
        let device = by_factor(&shards, FactorType::Device);
        let presence = by_factor(&shards, FactorType::Presence);

        // Both device shards are individually valid
        let result = manager.reconstruct_key(&[device.clone(), device, presence]);
        assert!(matches!(
            result,
            Err(ShardError::DuplicateShardFactor(FactorType::Device))
        ));
    }

    #[test]
    fn test_mixed_sets_rejected() {
        let manager = manager();
        let a = manager.split_with_policy(&[1u8; 32]).unwrap();
        let b = manager.split_with_policy(&[1u8; 32]).unwrap();

        let mixed = vec![
            by_factor(&a, FactorType::Device),
            by_factor(&b, FactorType::Presence),
            by_factor(&a, FactorType::Biometric),
        ];
        assert!(matches!(
            manager.reconstruct_key(&mixed),
            Err(ShardError::MixedShardSets)
        ));
    }

    #[test]
    fn test_shards_from_other_integrity_key_rejected() {
        let ours = manager();
        let theirs = manager();
        let shards = theirs.split_with_policy(&[9u8; 32]).unwrap();

        assert!(matches!(
            ours.reconstruct_key(&shards),
            Err(ShardError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn test_two_of_three_policy() {
        let manager = manager();
        let master = MasterKey::generate();
        let shards = manager
            .split_key(master.as_bytes(), 2, &FactorType::ALL)
            .unwrap();

        for pair in [[0, 1], [0, 2], [1, 2]] {
            let subset = vec![shards[pair[0]].clone(), shards[pair[1]].clone()];
            let recovered = manager.reconstruct_key(&subset).unwrap();
            assert_eq!(recovered.as_bytes(), master.as_bytes());
        }
        assert!(matches!(
            manager.reconstruct_key(&shards[..1]),
            Err(ShardError::InsufficientShards { required: 2, provided: 1 })
        ));
    }

    #[test]
    fn test_split_validation() {
        let manager = manager();

        assert!(matches!(
            manager.split_key(&[], 3, &FactorType::ALL),
            Err(ShardError::EmptySecret)
        ));
        assert!(matches!(
            manager.split_key(&[1u8; 32], 0, &FactorType::ALL),
            Err(ShardError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            manager.split_key(&[1u8; 32], 4, &FactorType::ALL),
            Err(ShardError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            manager.split_key(
                &[1u8; 32],
                2,
                &[FactorType::Device, FactorType::Device, FactorType::Presence]
            ),
            Err(ShardError::DuplicateShardFactor(FactorType::Device))
        ));
    }

    #[test]
    fn test_payload_does_not_leak_secret() {
        let manager = manager();
        let master = [0x42u8; 32];
        let a = manager.split_with_policy(&master).unwrap();
        let b = manager.split_with_policy(&master).unwrap();

        for shard in &a {
            assert_ne!(&shard.payload[1..], &master[..]);
        }
        // Fresh randomness per split
        assert_ne!(a[0].payload, b[0].payload);
    }

    #[test]
    fn test_failed_reconstruction_leaves_store_untouched() {
        let store = Arc::new(MemoryKeyStore::new());
        let manager = ShardManager::with_default_policy(Arc::clone(&store)).unwrap();
        let before = store.list_keys();

        let shards = manager.split_with_policy(&[3u8; 32]).unwrap();
        let _ = manager.reconstruct_key(&shards[..1]);

        assert_eq!(store.list_keys(), before);
    }

    #[test]
    fn test_compact_encoding_round_trip() {
        let manager = manager();
        let shards = manager.split_with_policy(&[5u8; 32]).unwrap();

        let decoded: Vec<KeyShard> = shards
            .iter()
            .map(|s| KeyShard::from_hex(&s.to_hex().unwrap()).unwrap())
            .collect();
        assert_eq!(decoded, shards);
        assert_eq!(manager.reconstruct_key(&decoded).unwrap().as_bytes(), &[5u8; 32]);
    }

    #[test]
    fn test_compact_decoding_rejects_garbage() {
        assert!(KeyShard::from_bytes(&[]).is_err());
        assert!(KeyShard::from_bytes(&[9, 1, 1, 3, 0]).is_err());
        assert!(KeyShard::from_hex("zz").is_err());

        let manager = manager();
        let shards = manager.split_with_policy(&[5u8; 32]).unwrap();
        let mut bytes = shards[0].to_bytes().unwrap();
        bytes.pop();
        assert!(KeyShard::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_longest_secret_fits_compact_form() {
        let manager = manager();

        let secret = vec![0x11u8; u16::MAX as usize - 1];
        let shards = manager.split_with_policy(&secret).unwrap();
        assert_eq!(shards[0].payload.len(), u16::MAX as usize);
        let decoded = KeyShard::from_hex(&shards[0].to_hex().unwrap()).unwrap();
        assert_eq!(decoded, shards[0]);

        let too_long = vec![0x11u8; u16::MAX as usize];
        assert!(matches!(
            manager.split_with_policy(&too_long),
            Err(ShardError::Malformed(_))
        ));
    }

    #[test]
    fn test_compact_encoding_rejects_oversized_set_id() {
        let manager = manager();
        let mut shards = manager.split_with_policy(&[5u8; 32]).unwrap();
        shards[0].set_id = "s".repeat(256);

        assert!(matches!(shards[0].to_bytes(), Err(ShardError::Malformed(_))));
        assert!(shards[0].to_hex().is_err());
    }

    #[test]
    fn test_collect_shards_from_providers() {
        let manager = manager();
        let master = MasterKey::generate();
        let shards = manager.split_with_policy(master.as_bytes()).unwrap();
        let set_id = shards[0].set_id.clone();

        let providers: Vec<StaticShardProvider> =
            shards.iter().cloned().map(StaticShardProvider::new).collect();
        let refs: Vec<&dyn ShardProvider> =
            providers.iter().map(|p| p as &dyn ShardProvider).collect();

        let collected = collect_shards(&refs, &set_id);
        assert_eq!(collected.len(), 3);
        assert_eq!(
            manager.reconstruct_key(&collected).unwrap().as_bytes(),
            master.as_bytes()
        );

        // Asking for another set yields nothing
        assert!(collect_shards(&refs, "other-set").is_empty());
    }

    #[test]
    fn test_factor_parsing() {
        assert_eq!("Device".parse::<FactorType>().unwrap(), FactorType::Device);
        assert_eq!("biometric".parse::<FactorType>().unwrap(), FactorType::Biometric);
        assert!("retina".parse::<FactorType>().is_err());
    }

    #[test]
    fn test_debug_redacts_payload() {
        let manager = manager();
        let shards = manager.split_with_policy(&[5u8; 32]).unwrap();
        let printed = format!("{:?}", shards[0]);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains(&hex::encode(&shards[0].payload)));

        let printed = format!("{:?}", MasterKey::new(vec![0xAB; 4]));
        assert_eq!(printed, "MasterKey([REDACTED; 4])");
    }
}

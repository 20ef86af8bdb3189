//! Property-based tests for glyphix-core using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use std::sync::Arc;

use proptest::prelude::*;
use glyphix_core::{
    DecryptError, EmotionalTone, EncryptedBlob, EncryptionEngine, FactorType, FocusLevel,
    KeyShard, KeyStore, MemoryKeyStore, PresenceMode, PresenceRequirement, PresenceState,
    ShardError, ShardManager, ShardPolicy, SocialContext,
};

// ============================================
// Fixtures
// ============================================

fn engine_with(aliases: &[&str]) -> EncryptionEngine<MemoryKeyStore> {
    let store = Arc::new(MemoryKeyStore::new());
    for alias in aliases {
        store.generate_key(alias).unwrap();
    }
    EncryptionEngine::new(store)
}

fn manager() -> ShardManager<MemoryKeyStore> {
    ShardManager::new(Arc::new(MemoryKeyStore::new()), ShardPolicy::default()).unwrap()
}

// ============================================
// Arbitrary Implementations
// ============================================

fn arb_alias() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._:-]{0,31}"
}

fn arb_focus() -> impl Strategy<Value = FocusLevel> {
    prop_oneof![
        Just(FocusLevel::Scattered),
        Just(FocusLevel::Low),
        Just(FocusLevel::Moderate),
        Just(FocusLevel::High),
        Just(FocusLevel::Deep),
    ]
}

fn arb_social() -> impl Strategy<Value = SocialContext> {
    prop_oneof![
        Just(SocialContext::Alone),
        Just(SocialContext::Intimate),
        Just(SocialContext::SmallGroup),
        Just(SocialContext::Public),
    ]
}

fn presence(focus: FocusLevel, social: SocialContext) -> PresenceState {
    PresenceState::new(PresenceMode::Reflective, EmotionalTone::Warm, focus, social)
}

fn requirement(focus: FocusLevel, social: SocialContext) -> PresenceRequirement {
    PresenceRequirement::new(PresenceMode::Reflective, EmotionalTone::Warm, focus, social)
}

// ============================================
// Property Tests
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ----------------------------------------
    // Encryption Engine Properties
    // ----------------------------------------

    #[test]
    fn encrypt_decrypt_roundtrip(
        alias in arb_alias(),
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let engine = engine_with(&[&alias]);
        let blob = engine.encrypt(&plaintext, &alias).unwrap();
        let recovered = engine.decrypt(&blob, &alias).unwrap();
        prop_assert_eq!(recovered.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn nonces_are_unique(plaintext in prop::collection::vec(any::<u8>(), 0..128)) {
        let engine = engine_with(&["k"]);
        let a = engine.encrypt(&plaintext, "k").unwrap();
        let b = engine.encrypt(&plaintext, "k").unwrap();
        prop_assert_ne!(a.nonce(), b.nonce());
        prop_assert_ne!(a.ciphertext(), b.ciphertext());
    }

    #[test]
    fn blob_bound_to_its_alias(plaintext in prop::collection::vec(any::<u8>(), 1..64)) {
        let engine = engine_with(&["first", "second"]);
        let blob = engine.encrypt(&plaintext, "first").unwrap();
        let result = engine.decrypt(&blob, "second");
        let is_mismatch = matches!(result, Err(DecryptError::KeyAliasMismatch { .. }));
        prop_assert!(is_mismatch);
    }

    #[test]
    fn any_ciphertext_bit_flip_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..128),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let engine = engine_with(&["k"]);
        let blob = engine.encrypt(&plaintext, "k").unwrap();

        let mut ciphertext = blob.ciphertext().to_vec();
        let i = position.index(ciphertext.len());
        ciphertext[i] ^= 1 << bit;
        let tampered = EncryptedBlob::from_parts(ciphertext, "k".to_string(), blob.nonce().to_vec());

        let result = engine.decrypt(&tampered, "k");
        let is_auth_failure = matches!(result, Err(DecryptError::AuthenticationFailed));
        prop_assert!(is_auth_failure);
    }

    #[test]
    fn any_nonce_bit_flip_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..128),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let engine = engine_with(&["k"]);
        let blob = engine.encrypt(&plaintext, "k").unwrap();

        let mut nonce = blob.nonce().to_vec();
        let i = position.index(nonce.len());
        nonce[i] ^= 1 << bit;
        let tampered = EncryptedBlob::from_parts(blob.ciphertext().to_vec(), "k".to_string(), nonce);

        let result = engine.decrypt(&tampered, "k");
        let is_auth_failure = matches!(result, Err(DecryptError::AuthenticationFailed));
        prop_assert!(is_auth_failure);
    }

    // ----------------------------------------
    // Sharding Properties
    // ----------------------------------------

    #[test]
    fn every_threshold_subset_reconstructs(
        secret in prop::collection::vec(any::<u8>(), 1..64),
        threshold in 1usize..=3,
    ) {
        let manager = manager();
        let shards = manager.split_key(&secret, threshold, &FactorType::ALL).unwrap();
        prop_assert_eq!(shards.len(), 3);

        // Every subset of size >= threshold, by bitmask
        for mask in 1u8..8 {
            let subset: Vec<KeyShard> = shards
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| s.clone())
                .collect();

            let result = manager.reconstruct_key(&subset);
            if subset.len() >= threshold {
                let key = result.unwrap();
                prop_assert_eq!(key.as_bytes(), secret.as_slice());
            } else {
                let is_insufficient = matches!(
                    result,
                    Err(ShardError::InsufficientShards { .. })
                );
                prop_assert!(is_insufficient);
            }
        }
    }

    #[test]
    fn any_payload_bit_flip_rejected(
        secret in prop::collection::vec(any::<u8>(), 1..64),
        which in 0usize..3,
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let manager = manager();
        let mut shards = manager.split_with_policy(&secret).unwrap();

        let i = position.index(shards[which].payload.len());
        shards[which].payload[i] ^= 1 << bit;
        let expected_id = shards[which].shard_id.clone();

        match manager.reconstruct_key(&shards) {
            Err(ShardError::IntegrityViolation { shard_id }) => {
                prop_assert_eq!(shard_id, expected_id);
            }
            other => prop_assert!(false, "expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn compact_shard_encoding_roundtrip(secret in prop::collection::vec(any::<u8>(), 1..64)) {
        let manager = manager();
        for shard in manager.split_with_policy(&secret).unwrap() {
            let decoded = KeyShard::from_hex(&shard.to_hex().unwrap()).unwrap();
            prop_assert_eq!(decoded, shard);
        }
    }

    #[test]
    fn shard_decoding_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = KeyShard::from_bytes(&bytes);
    }

    // ----------------------------------------
    // Presence Matching Properties
    // ----------------------------------------

    #[test]
    fn focus_matching_is_monotonic(
        current in arb_focus(),
        required in arb_focus(),
        social in arb_social(),
    ) {
        let req = requirement(required, SocialContext::Public);
        prop_assert_eq!(req.is_satisfied_by(&presence(current, social)), current >= required);
    }

    #[test]
    fn social_matching_is_privacy_ordered(
        current in arb_social(),
        required in arb_social(),
    ) {
        let req = requirement(FocusLevel::Scattered, required);
        prop_assert_eq!(
            req.is_satisfied_by(&presence(FocusLevel::Scattered, current)),
            current <= required
        );
    }

    #[test]
    fn public_requirement_accepts_any_setting(current in arb_social(), focus in arb_focus()) {
        let req = requirement(FocusLevel::Scattered, SocialContext::Public);
        prop_assert!(req.is_satisfied_by(&presence(focus, current)));
    }
}

// ============================================
// Invariant Tests (non-proptest)
// ============================================

#[test]
fn default_policy_is_three_of_three() {
    let policy = ShardPolicy::default();
    assert_eq!(policy.threshold, 3);
    assert_eq!(
        policy.factors,
        vec![FactorType::Device, FactorType::Presence, FactorType::Biometric]
    );
}

#[test]
fn idempotent_generation_keeps_one_working_key() {
    let store = Arc::new(MemoryKeyStore::new());
    store.generate_key("dup").unwrap();
    store.generate_key("dup").unwrap();
    assert_eq!(store.list_keys(), vec!["dup".to_string()]);

    let engine = EncryptionEngine::new(store);
    let blob = engine.encrypt(b"still works", "dup").unwrap();
    assert_eq!(engine.decrypt(&blob, "dup").unwrap().as_slice(), b"still works");
}

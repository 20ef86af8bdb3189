#![no_main]

use std::sync::Arc;

use glyphix_core::{EncryptedBlob, EncryptionEngine, KeyStore, MemoryKeyStore};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Blob JSON from untrusted storage should not panic on parse
    let blob: EncryptedBlob = match serde_json::from_slice(data) {
        Ok(blob) => blob,
        Err(_) => return,
    };

    let store = Arc::new(MemoryKeyStore::new());
    if store.generate_key("fuzz").is_err() {
        return;
    }
    let engine = EncryptionEngine::new(store);

    // A freshly generated key never authenticates forged content
    assert!(engine.decrypt(&blob, "fuzz").is_err());
});

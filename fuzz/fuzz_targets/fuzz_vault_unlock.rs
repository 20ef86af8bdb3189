#![no_main]

use glyphix_core::FileKeyStore;
use libfuzzer_sys::fuzz_target;

// Argon2 cost is read from the file; keep it cheap so runs stay fast
const MAX_MEMORY_KIB: u64 = 64;
const MAX_ITERATIONS: u64 = 2;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let kdf = &value["kdf"];
        let memory = kdf["memory_kib"].as_u64().unwrap_or(0);
        let iterations = kdf["iterations"].as_u64().unwrap_or(0);
        if memory > MAX_MEMORY_KIB || iterations > MAX_ITERATIONS {
            return;
        }
    }

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("vault.json");
    std::fs::write(&path, data).unwrap();

    // Arbitrary vault bytes must fail cleanly, never unlock
    assert!(FileKeyStore::unlock(&path, "fuzz passphrase").is_err());
});

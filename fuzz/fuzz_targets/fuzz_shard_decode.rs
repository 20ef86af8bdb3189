#![no_main]

use glyphix_core::KeyShard;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing arbitrary bytes should not panic
    if let Ok(shard) = KeyShard::from_bytes(data) {
        // Accepted input is canonical
        assert_eq!(shard.to_bytes().unwrap(), data);
        assert_eq!(shard.shard_id, format!("{}-{}", shard.set_id, shard.index));

        let reparsed = KeyShard::from_hex(&shard.to_hex().unwrap()).unwrap();
        assert_eq!(reparsed, shard);
    }
});

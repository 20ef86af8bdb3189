#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use glyphix_core::{MemoryKeyStore, ShardManager};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Mutation {
    shard: u8,
    payload_flips: Vec<(u8, u8)>,
    tag_flip: Option<(u8, u8)>,
    new_index: Option<u8>,
    new_threshold: Option<u8>,
    drop_shard: Option<u8>,
}

const SECRET: [u8; 32] = [0x42; 32];

fuzz_target!(|mutation: Mutation| {
    let manager = match ShardManager::with_default_policy(Arc::new(MemoryKeyStore::new())) {
        Ok(manager) => manager,
        Err(_) => return,
    };
    let mut shards = manager.split_with_policy(&SECRET).unwrap();

    let target = mutation.shard as usize % shards.len();
    {
        let shard = &mut shards[target];
        for (position, mask) in &mutation.payload_flips {
            let i = *position as usize % shard.payload.len();
            shard.payload[i] ^= mask;
        }
        if let Some((position, mask)) = mutation.tag_flip {
            shard.integrity_tag[position as usize % 32] ^= mask;
        }
        if let Some(index) = mutation.new_index {
            shard.index = index;
        }
        if let Some(threshold) = mutation.new_threshold {
            shard.threshold = threshold;
        }
    }
    if let Some(i) = mutation.drop_shard {
        shards.remove(i as usize % shards.len());
    }

    // Reconstruction either fails or yields exactly the original key
    if let Ok(key) = manager.reconstruct_key(&shards) {
        assert_eq!(key.as_bytes(), &SECRET);
    }
});

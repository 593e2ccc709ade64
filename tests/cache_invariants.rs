use apilo_cache::{CacheConfig, CacheEntry, CacheError};
use bytes::Bytes;
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

fn entry(body: Vec<u8>) -> CacheEntry {
    CacheEntry::new(200, HashMap::new(), Bytes::from(body), None)
}

#[test]
fn hit_after_insert_returns_the_same_body() {
    let cache = CacheConfig::builder()
        .max_bytes(1024 * 1024)
        .default_ttl(Duration::from_secs(300))
        .build();

    cache
        .set("fp".to_string(), entry(b"hello".to_vec()))
        .unwrap();

    let found = cache.get("fp").expect("hit");
    assert_eq!(found.body.as_ref(), b"hello");
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.used_bytes(), 5);
}

#[test]
fn ttl_expiry_reads_as_miss_then_reinsert_hits() {
    let cache = CacheConfig::builder()
        .max_bytes(1024)
        .default_ttl(Duration::from_millis(100))
        .build();

    cache.set("fp".to_string(), entry(b"v1".to_vec())).unwrap();
    std::thread::sleep(Duration::from_millis(150));
    assert!(cache.get("fp").is_none(), "expired entry must read as miss");

    cache.set("fp".to_string(), entry(b"v2".to_vec())).unwrap();
    assert_eq!(cache.get("fp").unwrap().body.as_ref(), b"v2");
}

/// The LRU scenario: fill three slots, touch the oldest, insert a fourth.
/// The untouched middle entry is the victim.
#[test]
fn lru_eviction_prefers_untouched_entries() {
    let cache = CacheConfig::builder()
        .max_bytes(1024)
        .max_entries(3)
        .default_ttl(Duration::from_secs(60))
        .build();

    cache.set("k0".to_string(), entry(b"0".to_vec())).unwrap();
    cache.set("k1".to_string(), entry(b"1".to_vec())).unwrap();
    cache.set("k2".to_string(), entry(b"2".to_vec())).unwrap();

    assert!(cache.get("k0").is_some());

    cache.set("k3".to_string(), entry(b"3".to_vec())).unwrap();

    assert!(cache.get("k1").is_none(), "k1 was least recently used");
    assert!(cache.get("k0").is_some());
    assert!(cache.get("k2").is_some());
    assert!(cache.get("k3").is_some());
}

#[test]
fn oversized_item_is_the_only_set_failure() {
    let cache = CacheConfig::builder().max_bytes(10).build();

    let err = cache
        .set("big".to_string(), entry(vec![0u8; 11]))
        .unwrap_err();
    assert!(matches!(err, CacheError::ItemTooLarge { size: 11, .. }));

    // At exactly the cap the insert succeeds.
    cache
        .set("fits".to_string(), entry(vec![0u8; 10]))
        .unwrap();
    assert_eq!(cache.used_bytes(), 10);
}

proptest! {
    /// used_bytes equals the sum of resident body lengths after every
    /// operation, for arbitrary set/get/clear interleavings.
    #[test]
    fn byte_accounting_matches_resident_bodies(
        ops in prop::collection::vec((0u8..8, 0usize..64, 0u8..10), 1..200)
    ) {
        let cache = CacheConfig::builder()
            .max_bytes(256)
            .default_ttl(Duration::from_secs(60))
            .build();

        for (key, body_len, action) in ops {
            let key = format!("k{key}");
            match action {
                0 => {
                    cache.clear();
                }
                1..=2 => {
                    let _ = cache.get(&key);
                }
                _ => {
                    let _ = cache.set(key, entry(vec![0u8; body_len]));
                }
            }

            let stats = cache.stats();
            let resident: u64 = stats
                .entry_details
                .iter()
                .map(|e| e.size_bytes as u64)
                .sum();
            prop_assert_eq!(stats.used_bytes, resident);
            prop_assert!(stats.used_bytes <= 256);
        }
    }
}

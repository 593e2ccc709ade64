//! Cache storage: LRU recency, TTL expiration, byte accounting.

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::events::CacheEvent;
use crate::policy::{AccessPattern, CachePolicy};
use crate::stats::{CacheStats, EntryStats};
use apilo_core::EventListeners;
use lru::LruCache;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The byte-bounded response cache.
///
/// Not synchronized; wrap in [`SharedCache`](crate::SharedCache) for
/// concurrent use. A single structure owns the entry map, the recency
/// order, and the byte accumulator, so the invariant
/// `used_bytes == sum(len(body))` holds at the end of every operation.
pub struct ResponseCache {
    entries: LruCache<String, CacheEntry>,
    access: HashMap<String, AccessPattern>,
    current_bytes: u64,
    max_bytes: u64,
    max_entries: Option<usize>,
    default_ttl: Duration,
    policy: Box<dyn CachePolicy>,
    listeners: EventListeners<CacheEvent>,
    name: String,
}

impl ResponseCache {
    pub(crate) fn new(
        max_bytes: u64,
        max_entries: Option<usize>,
        default_ttl: Duration,
        policy: Box<dyn CachePolicy>,
        listeners: EventListeners<CacheEvent>,
        name: String,
    ) -> Self {
        Self {
            entries: LruCache::unbounded(),
            access: HashMap::new(),
            current_bytes: 0,
            max_bytes,
            max_entries,
            default_ttl,
            policy,
            listeners,
            name,
        }
    }

    /// Looks up a live entry, promoting it to most recently used.
    ///
    /// Expired entries are removed here, in the same critical section, and
    /// report as a miss.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        // Check expiry before promoting so a dead entry never touches the
        // recency order.
        let expired = self.entries.peek(key).map(CacheEntry::is_expired);
        match expired {
            None => {
                self.emit(CacheEvent::Miss {
                    source: self.name.clone(),
                    timestamp: Instant::now(),
                    key: key.to_string(),
                });
                None
            }
            Some(true) => {
                if let Some(removed) = self.entries.pop(key) {
                    self.current_bytes -= removed.size() as u64;
                }
                self.access.remove(key);
                self.emit(CacheEvent::Expired {
                    source: self.name.clone(),
                    timestamp: Instant::now(),
                    key: key.to_string(),
                });
                None
            }
            Some(false) => {
                let entry = self.entries.get(key).cloned();
                self.access
                    .entry(key.to_string())
                    .or_insert_with(AccessPattern::new)
                    .record_access();
                self.emit(CacheEvent::Hit {
                    source: self.name.clone(),
                    timestamp: Instant::now(),
                    key: key.to_string(),
                });
                entry
            }
        }
    }

    /// Stores an entry under `key`, evicting least-recently-used entries
    /// until it fits.
    ///
    /// Returns `Ok(true)` when stored, `Ok(false)` when the installed policy
    /// declined the response, and [`CacheError::ItemTooLarge`] when the body
    /// alone exceeds the byte cap.
    pub fn set(&mut self, key: String, mut entry: CacheEntry) -> Result<bool, CacheError> {
        let size = entry.size() as u64;
        if size > self.max_bytes {
            return Err(CacheError::ItemTooLarge {
                size: entry.size(),
                max_bytes: self.max_bytes,
            });
        }

        if !self
            .policy
            .should_cache(entry.status, entry.size(), &entry.headers, self.max_bytes)
        {
            self.emit(CacheEvent::Rejected {
                source: self.name.clone(),
                timestamp: Instant::now(),
                key,
            });
            return Ok(false);
        }

        entry.ttl = self.policy.compute_ttl(&entry, self.access.get(&key));
        if entry.ttl.is_zero() {
            entry.ttl = self.default_ttl;
        }

        // Replacement: drop the old entry's bytes first, then treat the new
        // one as a fresh insert.
        if let Some(old) = self.entries.pop(&key) {
            self.current_bytes -= old.size() as u64;
        }

        self.make_room(size);

        self.current_bytes += size;
        let event_size = entry.size();
        self.entries.push(key.clone(), entry);
        self.emit(CacheEvent::Inserted {
            source: self.name.clone(),
            timestamp: Instant::now(),
            key,
            size: event_size,
        });
        Ok(true)
    }

    /// Evicts LRU entries until `incoming` bytes fit and the entry cap has a
    /// free slot. Policy vetoes are honored while possible: a vetoed entry
    /// is promoted instead of dropped, and each entry is spared at most once
    /// so the cap always wins in the end.
    fn make_room(&mut self, incoming: u64) {
        let mut veto_budget = self.entries.len();

        loop {
            let over_bytes = self.current_bytes + incoming > self.max_bytes;
            let over_entries = self
                .max_entries
                .is_some_and(|cap| self.entries.len() >= cap);
            if !over_bytes && !over_entries {
                break;
            }

            let Some((victim_key, victim)) = self.entries.pop_lru() else {
                break;
            };

            if veto_budget > 0 && !self.policy.can_evict(&victim_key, self.access.get(&victim_key))
            {
                veto_budget -= 1;
                self.entries.push(victim_key, victim);
                continue;
            }

            self.current_bytes -= victim.size() as u64;
            self.access.remove(&victim_key);
            #[cfg(feature = "tracing")]
            tracing::debug!(key = %victim_key, size = victim.size(), "evicting cache entry");
            self.emit(CacheEvent::Evicted {
                source: self.name.clone(),
                timestamp: Instant::now(),
                key: victim_key,
                size: victim.size(),
            });
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        let entries = self.entries.len();
        self.entries.clear();
        self.access.clear();
        self.current_bytes = 0;
        self.emit(CacheEvent::Cleared {
            source: self.name.clone(),
            timestamp: Instant::now(),
            entries,
        });
    }

    /// Current number of entries, including any not yet lazily expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Bytes currently charged against the budget.
    pub fn used_bytes(&self) -> u64 {
        self.current_bytes
    }

    /// Point-in-time stats with per-entry age and TTL remaining, most
    /// recently used first.
    pub fn stats(&self) -> CacheStats {
        let entry_details = self
            .entries
            .iter()
            .map(|(key, entry)| EntryStats {
                key: key.clone(),
                size_bytes: entry.size(),
                age_secs: entry.age().as_secs_f64(),
                ttl_remaining_secs: entry.ttl_remaining().as_secs_f64(),
            })
            .collect();

        CacheStats {
            entries: self.entries.len(),
            used_bytes: self.current_bytes,
            max_bytes: self.max_bytes,
            used_percent: if self.max_bytes > 0 {
                self.current_bytes as f64 / self.max_bytes as f64 * 100.0
            } else {
                0.0
            },
            default_ttl_secs: self.default_ttl.as_secs(),
            policy: self.policy.name().to_string(),
            entry_details,
        }
    }

    fn emit(&self, event: CacheEvent) {
        #[cfg(feature = "metrics")]
        {
            use apilo_core::ApiloEvent;
            metrics::counter!(
                "apilo_cache_operations_total",
                "cache" => self.name.clone(),
                "operation" => event.event_type()
            )
            .increment(1);
        }
        self.listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{FixedTtlPolicy, LfuPolicy};
    use bytes::Bytes;

    fn cache(max_bytes: u64, max_entries: Option<usize>, ttl: Duration) -> ResponseCache {
        ResponseCache::new(
            max_bytes,
            max_entries,
            ttl,
            Box::new(FixedTtlPolicy::new(ttl)),
            EventListeners::new(),
            "test".to_string(),
        )
    }

    fn entry(body: &'static [u8]) -> CacheEntry {
        CacheEntry::new(200, HashMap::new(), Bytes::from_static(body), None)
    }

    #[test]
    fn get_after_set_returns_the_entry() {
        let mut cache = cache(1024, None, Duration::from_secs(60));
        cache.set("k1".to_string(), entry(b"hello")).unwrap();

        let found = cache.get("k1").expect("entry present");
        assert_eq!(found.body.as_ref(), b"hello");
        assert_eq!(cache.used_bytes(), 5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_key_is_a_miss() {
        let mut cache = cache(1024, None, Duration::from_secs(60));
        assert!(cache.get("absent").is_none());
    }

    #[test]
    fn oversized_body_is_rejected() {
        let mut cache = cache(4, None, Duration::from_secs(60));
        let err = cache.set("k1".to_string(), entry(b"hello")).unwrap_err();
        assert_eq!(
            err,
            CacheError::ItemTooLarge {
                size: 5,
                max_bytes: 4
            }
        );
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn replacement_adjusts_byte_accounting_by_the_delta() {
        let mut cache = cache(1024, None, Duration::from_secs(60));
        cache.set("k1".to_string(), entry(b"1234567890")).unwrap();
        assert_eq!(cache.used_bytes(), 10);

        cache.set("k1".to_string(), entry(b"123")).unwrap();
        assert_eq!(cache.used_bytes(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn byte_pressure_evicts_least_recently_used() {
        let mut cache = cache(12, None, Duration::from_secs(60));
        cache.set("k0".to_string(), entry(b"aaaa")).unwrap();
        cache.set("k1".to_string(), entry(b"bbbb")).unwrap();
        cache.set("k2".to_string(), entry(b"cccc")).unwrap();
        assert_eq!(cache.used_bytes(), 12);

        // Touch k0 so k1 is the LRU victim.
        cache.get("k0").unwrap();

        cache.set("k3".to_string(), entry(b"dddd")).unwrap();
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k0").is_some());
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
        assert_eq!(cache.used_bytes(), 12);
    }

    #[test]
    fn entry_cap_evicts_before_insert() {
        let mut cache = cache(1024, Some(2), Duration::from_secs(60));
        cache.set("k0".to_string(), entry(b"a")).unwrap();
        cache.set("k1".to_string(), entry(b"b")).unwrap();
        cache.set("k2".to_string(), entry(b"c")).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("k0").is_none());
    }

    #[test]
    fn expired_entry_reads_as_miss_and_is_removed() {
        let mut cache = cache(1024, None, Duration::from_millis(20));
        cache.set("k1".to_string(), entry(b"hello")).unwrap();

        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get("k1").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn clear_resets_accounting() {
        let mut cache = cache(1024, None, Duration::from_secs(60));
        cache.set("k0".to_string(), entry(b"aaaa")).unwrap();
        cache.set("k1".to_string(), entry(b"bbbb")).unwrap();

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used_bytes(), 0);
        assert!(cache.get("k0").is_none());
    }

    #[test]
    fn policy_rejection_stores_nothing() {
        let mut cache = cache(1024, None, Duration::from_secs(60));
        let stored = cache
            .set(
                "k1".to_string(),
                CacheEntry::new(502, HashMap::new(), Bytes::from_static(b"bad"), None),
            )
            .unwrap();
        assert!(!stored);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn lfu_veto_spares_hot_entries_when_possible() {
        let mut cache = ResponseCache::new(
            12,
            None,
            Duration::from_secs(60),
            Box::new(LfuPolicy::with_hot_threshold(Duration::from_secs(60), 3)),
            EventListeners::new(),
            "test".to_string(),
        );
        cache.set("hot".to_string(), entry(b"aaaa")).unwrap();
        cache.set("cold1".to_string(), entry(b"bbbb")).unwrap();
        cache.set("cold2".to_string(), entry(b"cccc")).unwrap();

        // Heat up "hot" past the protection threshold, then age it back to
        // the LRU position via touches on the cold keys.
        for _ in 0..5 {
            cache.get("hot").unwrap();
        }
        cache.get("cold1").unwrap();
        cache.get("cold2").unwrap();

        cache.set("new".to_string(), entry(b"dddd")).unwrap();

        assert!(cache.get("hot").is_some(), "hot entry must be spared");
        assert!(cache.get("cold1").is_none(), "cold LRU entry evicted");
        assert_eq!(cache.used_bytes(), 12);
    }

    #[test]
    fn veto_cannot_hold_the_cache_over_budget() {
        let mut cache = ResponseCache::new(
            8,
            None,
            Duration::from_secs(60),
            Box::new(LfuPolicy::with_hot_threshold(Duration::from_secs(60), 1)),
            EventListeners::new(),
            "test".to_string(),
        );
        cache.set("k0".to_string(), entry(b"aaaa")).unwrap();
        cache.set("k1".to_string(), entry(b"bbbb")).unwrap();
        // Both entries are now "hot" (every get raises access_count).
        cache.get("k0").unwrap();
        cache.get("k1").unwrap();

        cache.set("k2".to_string(), entry(b"cccc")).unwrap();
        assert!(cache.used_bytes() <= 8);
        assert!(cache.get("k2").is_some());
    }

    #[test]
    fn stats_reflect_entries_and_budget() {
        let mut cache = cache(100, None, Duration::from_secs(60));
        cache.set("k0".to_string(), entry(b"1234567890")).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.used_bytes, 10);
        assert_eq!(stats.max_bytes, 100);
        assert!((stats.used_percent - 10.0).abs() < f64::EPSILON);
        assert_eq!(stats.entry_details.len(), 1);
        assert!(stats.entry_details[0].ttl_remaining_secs > 0.0);
    }

    #[test]
    fn hit_and_miss_events_fire() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let m = Arc::clone(&misses);

        let mut listeners = EventListeners::new();
        listeners.add(apilo_core::FnListener::new(move |event: &CacheEvent| {
            match event {
                CacheEvent::Hit { .. } => {
                    h.fetch_add(1, Ordering::SeqCst);
                }
                CacheEvent::Miss { .. } => {
                    m.fetch_add(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }));

        let mut cache = ResponseCache::new(
            1024,
            None,
            Duration::from_secs(60),
            Box::new(FixedTtlPolicy::new(Duration::from_secs(60))),
            listeners,
            "test".to_string(),
        );

        cache.get("absent");
        cache.set("k".to_string(), entry(b"x")).unwrap();
        cache.get("k");

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(misses.load(Ordering::SeqCst), 1);
    }
}

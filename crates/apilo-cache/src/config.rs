//! Cache configuration builder.

use crate::events::CacheEvent;
use crate::policy::{CachePolicy, PolicyKind};
use crate::shared::SharedCache;
use crate::store::ResponseCache;
use apilo_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for the response cache.
pub struct CacheConfig {
    pub(crate) max_bytes: u64,
    pub(crate) max_entries: Option<usize>,
    pub(crate) default_ttl: Duration,
    pub(crate) policy: Option<Box<dyn CachePolicy>>,
    pub(crate) policy_kind: PolicyKind,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
    pub(crate) name: String,
}

impl CacheConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }
}

impl CacheConfig {
    /// Constructs the shared cache described by this configuration.
    pub fn build(self) -> SharedCache {
        let policy = self
            .policy
            .unwrap_or_else(|| self.policy_kind.build(self.default_ttl));

        SharedCache::new(ResponseCache::new(
            self.max_bytes,
            self.max_entries,
            self.default_ttl,
            policy,
            self.event_listeners,
            self.name,
        ))
    }
}

/// Builder for configuring and constructing a [`SharedCache`].
pub struct CacheConfigBuilder {
    max_bytes: u64,
    max_entries: Option<usize>,
    default_ttl: Duration,
    policy: Option<Box<dyn CachePolicy>>,
    policy_kind: PolicyKind,
    event_listeners: EventListeners<CacheEvent>,
    name: String,
}

impl CacheConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_bytes: 500 * 1024 * 1024,
            max_entries: None,
            default_ttl: Duration::from_secs(600),
            policy: None,
            policy_kind: PolicyKind::Default,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the byte cap on the sum of cached body sizes.
    ///
    /// Default: 500 MiB
    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Caps the number of resident entries.
    ///
    /// Default: unlimited (the byte cap alone bounds the cache)
    pub fn max_entries(mut self, entries: usize) -> Self {
        self.max_entries = Some(entries);
        self
    }

    /// Sets the TTL assigned to entries by the default policy.
    ///
    /// Default: 10 minutes
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Selects one of the built-in policies.
    ///
    /// Default: `PolicyKind::Default` (uniform TTL)
    pub fn policy_kind(mut self, kind: PolicyKind) -> Self {
        self.policy_kind = kind;
        self
    }

    /// Installs a custom policy, overriding `policy_kind`.
    pub fn policy<P: CachePolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Give this cache a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Register a callback for cache hits.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CacheEvent| {
                if matches!(event, CacheEvent::Hit { .. }) {
                    f();
                }
            }));
        self
    }

    /// Register a callback for cache misses (including expirations).
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CacheEvent| {
                if matches!(event, CacheEvent::Miss { .. } | CacheEvent::Expired { .. }) {
                    f();
                }
            }));
        self
    }

    /// Register a callback for evictions.
    pub fn on_eviction<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CacheEvent| {
                if let CacheEvent::Evicted { size, .. } = event {
                    f(*size);
                }
            }));
        self
    }

    /// Builds the shared cache.
    pub fn build(self) -> SharedCache {
        CacheConfig {
            max_bytes: self.max_bytes,
            max_entries: self.max_entries,
            default_ttl: self.default_ttl,
            policy: self.policy,
            policy_kind: self.policy_kind,
            event_listeners: self.event_listeners,
            name: self.name,
        }
        .build()
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn builder_defaults_match_daemon_defaults() {
        let cache = CacheConfig::builder().build();
        let stats = cache.stats();
        assert_eq!(stats.max_bytes, 500 * 1024 * 1024);
        assert_eq!(stats.default_ttl_secs, 600);
        assert_eq!(stats.policy, "default");
    }

    #[test]
    fn hit_and_miss_callbacks_fire() {
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let m = Arc::clone(&misses);

        let cache = CacheConfig::builder()
            .max_bytes(1024)
            .on_hit(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .on_miss(move || {
                m.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        cache.get("absent");
        cache
            .set(
                "k".to_string(),
                crate::CacheEntry::new(200, HashMap::new(), Bytes::from_static(b"v"), None),
            )
            .unwrap();
        cache.get("k");

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(misses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn eviction_callback_reports_size() {
        let evicted = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&evicted);

        let cache = CacheConfig::builder()
            .max_bytes(8)
            .on_eviction(move |size| {
                e.fetch_add(size, Ordering::SeqCst);
            })
            .build();

        cache
            .set(
                "k0".to_string(),
                crate::CacheEntry::new(200, HashMap::new(), Bytes::from_static(b"aaaa"), None),
            )
            .unwrap();
        cache
            .set(
                "k1".to_string(),
                crate::CacheEntry::new(200, HashMap::new(), Bytes::from_static(b"bbbbbb"), None),
            )
            .unwrap();

        assert_eq!(evicted.load(Ordering::SeqCst), 4);
    }
}

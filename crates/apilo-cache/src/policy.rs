//! Pluggable cache policies.
//!
//! A policy answers three questions: how long an entry should live, whether
//! a response should be stored at all, and whether a resident entry may be
//! evicted to make room. The cache core works with the trivial fixed-TTL
//! policy; the adaptive policy scales TTL by observed access frequency and
//! volatility.

use crate::entry::CacheEntry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Observed access behavior for one cache key.
#[derive(Debug, Clone)]
pub struct AccessPattern {
    /// Number of lookups that found this key.
    pub access_count: u64,
    /// Exponentially weighted average interval between accesses.
    pub avg_interval: Duration,
    /// Normalized interval jitter in [0, 1]; low values mean a steady
    /// access rhythm.
    pub volatility: f64,
    pub(crate) last_access: Instant,
}

impl AccessPattern {
    pub(crate) fn new() -> Self {
        Self {
            access_count: 0,
            avg_interval: Duration::ZERO,
            volatility: 0.0,
            last_access: Instant::now(),
        }
    }

    /// Folds one access into the running interval average and volatility.
    pub(crate) fn record_access(&mut self) {
        const ALPHA: f64 = 0.3;

        let now = Instant::now();
        let interval = now.duration_since(self.last_access);
        self.last_access = now;
        self.access_count += 1;

        if self.access_count <= 1 {
            return;
        }

        let interval_s = interval.as_secs_f64();
        let avg_s = self.avg_interval.as_secs_f64();
        if avg_s > 0.0 {
            let deviation = ((interval_s - avg_s).abs() / avg_s).min(1.0);
            self.volatility = self.volatility * (1.0 - ALPHA) + deviation * ALPHA;
        }
        let new_avg = if avg_s == 0.0 {
            interval_s
        } else {
            avg_s * (1.0 - ALPHA) + interval_s * ALPHA
        };
        self.avg_interval = Duration::from_secs_f64(new_avg);
    }
}

/// Tags for the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Uniform default TTL, no eviction vetoes.
    Default,
    /// Uniform explicit TTL.
    Ttl,
    /// TTL scaled by access frequency and volatility.
    Adaptive,
    /// Frequently used entries are protected from eviction.
    Lfu,
}

impl PolicyKind {
    /// Builds the policy for this tag. `default_ttl` seeds every variant.
    pub fn build(self, default_ttl: Duration) -> Box<dyn CachePolicy> {
        match self {
            PolicyKind::Default => Box::new(FixedTtlPolicy::named("default", default_ttl)),
            PolicyKind::Ttl => Box::new(FixedTtlPolicy::named("ttl", default_ttl)),
            PolicyKind::Adaptive => Box::new(AdaptivePolicy::new(default_ttl)),
            PolicyKind::Lfu => Box::new(LfuPolicy::new(default_ttl)),
        }
    }
}

/// Per-insert TTL computation, cacheability gate, and eviction veto.
pub trait CachePolicy: Send {
    /// TTL for a fresh insert, given what is known about the key's access
    /// pattern so far.
    fn compute_ttl(&self, entry: &CacheEntry, pattern: Option<&AccessPattern>) -> Duration;

    /// Whether a response should be stored at all.
    fn should_cache(
        &self,
        status: u16,
        size: usize,
        headers: &HashMap<String, String>,
        max_entry_bytes: u64,
    ) -> bool {
        default_should_cache(status, size, headers, max_entry_bytes)
    }

    /// Whether the entry at `key` may be evicted to make room. Vetoes are
    /// advisory: the cache overrides them when the byte cap cannot otherwise
    /// be met.
    fn can_evict(&self, _key: &str, _pattern: Option<&AccessPattern>) -> bool {
        true
    }

    /// Policy tag, for stats output.
    fn name(&self) -> &'static str;
}

/// The default cacheability gate: no server errors, no oversized bodies,
/// and `Cache-Control: no-store` / `no-cache` are honored.
pub fn default_should_cache(
    status: u16,
    size: usize,
    headers: &HashMap<String, String>,
    max_entry_bytes: u64,
) -> bool {
    if status >= 500 {
        return false;
    }
    if size as u64 > max_entry_bytes {
        return false;
    }
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("cache-control") {
            let value = value.to_ascii_lowercase();
            if value.contains("no-store") || value.contains("no-cache") {
                return false;
            }
        }
    }
    true
}

/// Uniform TTL for every entry.
pub struct FixedTtlPolicy {
    name: &'static str,
    ttl: Duration,
}

impl FixedTtlPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self::named("ttl", ttl)
    }

    fn named(name: &'static str, ttl: Duration) -> Self {
        Self { name, ttl }
    }
}

impl CachePolicy for FixedTtlPolicy {
    fn compute_ttl(&self, _entry: &CacheEntry, _pattern: Option<&AccessPattern>) -> Duration {
        self.ttl
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// TTL scaled by access frequency and interval volatility.
///
/// Hot keys (>= 100 accesses) are clamped to the upper TTL bound; warm keys
/// (>= 10) get double the base. A steady access rhythm (volatility < 0.3)
/// stretches the TTL by 1.5x, an erratic one (> 0.7) shrinks it to 0.7x.
/// The result is always clamped to [min_ttl, max_ttl].
pub struct AdaptivePolicy {
    base_ttl: Duration,
    min_ttl: Duration,
    max_ttl: Duration,
}

impl AdaptivePolicy {
    pub fn new(base_ttl: Duration) -> Self {
        Self {
            base_ttl,
            min_ttl: base_ttl / 10,
            max_ttl: base_ttl * 6,
        }
    }

    pub fn with_bounds(base_ttl: Duration, min_ttl: Duration, max_ttl: Duration) -> Self {
        Self {
            base_ttl,
            min_ttl,
            max_ttl,
        }
    }
}

impl CachePolicy for AdaptivePolicy {
    fn compute_ttl(&self, _entry: &CacheEntry, pattern: Option<&AccessPattern>) -> Duration {
        let Some(pattern) = pattern else {
            return self.base_ttl;
        };

        let mut ttl = if pattern.access_count >= 100 {
            self.max_ttl
        } else if pattern.access_count >= 10 {
            self.base_ttl * 2
        } else {
            self.base_ttl
        };

        if pattern.volatility < 0.3 {
            ttl = ttl.mul_f64(1.5);
        } else if pattern.volatility > 0.7 {
            ttl = ttl.mul_f64(0.7);
        }

        ttl.clamp(self.min_ttl, self.max_ttl)
    }

    fn name(&self) -> &'static str {
        "adaptive"
    }
}

/// Protects frequently used entries from eviction.
pub struct LfuPolicy {
    ttl: Duration,
    hot_threshold: u64,
}

impl LfuPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            hot_threshold: 10,
        }
    }

    pub fn with_hot_threshold(ttl: Duration, hot_threshold: u64) -> Self {
        Self { ttl, hot_threshold }
    }
}

impl CachePolicy for LfuPolicy {
    fn compute_ttl(&self, _entry: &CacheEntry, _pattern: Option<&AccessPattern>) -> Duration {
        self.ttl
    }

    fn can_evict(&self, _key: &str, pattern: Option<&AccessPattern>) -> bool {
        match pattern {
            Some(p) => p.access_count < self.hot_threshold,
            None => true,
        }
    }

    fn name(&self) -> &'static str {
        "lfu"
    }
}

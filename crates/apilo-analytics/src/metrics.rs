//! Process-wide atomic counters.

use apilo_core::{TokenPricing, TokenUsage};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hot-path counters, all atomics: no lock is taken on the request path.
///
/// Gauges sampled by the supervisor (CPU, memory) live here too; the CPU
/// percentage is stored as `f64` bits in an `AtomicU64`.
#[derive(Clone, Default)]
pub struct DaemonMetrics {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    errors: AtomicU64,
    latency_ns_total: AtomicU64,
    latency_count: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    token_cost_cents: AtomicU64,
    token_requests: AtomicU64,
    cpu_percent_bits: AtomicU64,
    memory_bytes: AtomicU64,
}

impl DaemonMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed call.
    pub fn record_request(&self, latency_ns: u64, cache_hit: bool, is_error: bool) {
        let c = &self.inner;
        c.total_requests.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            c.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            c.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
        if is_error {
            c.errors.fetch_add(1, Ordering::Relaxed);
        }
        c.latency_ns_total.fetch_add(latency_ns, Ordering::Relaxed);
        c.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Accumulates token counts and their cost in integer cents.
    pub fn record_tokens(&self, usage: &TokenUsage, pricing: &TokenPricing) {
        let c = &self.inner;
        c.input_tokens
            .fetch_add(usage.input_tokens, Ordering::Relaxed);
        c.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
        c.token_cost_cents
            .fetch_add(pricing.usage_cost_cents(usage), Ordering::Relaxed);
        c.token_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_cpu_percent(&self, percent: f64) {
        self.inner
            .cpu_percent_bits
            .store(percent.to_bits(), Ordering::Relaxed);
    }

    pub fn set_memory_bytes(&self, bytes: u64) {
        self.inner.memory_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Zeroes every counter and gauge.
    pub fn reset(&self) {
        let c = &self.inner;
        c.total_requests.store(0, Ordering::Relaxed);
        c.cache_hits.store(0, Ordering::Relaxed);
        c.cache_misses.store(0, Ordering::Relaxed);
        c.errors.store(0, Ordering::Relaxed);
        c.latency_ns_total.store(0, Ordering::Relaxed);
        c.latency_count.store(0, Ordering::Relaxed);
        c.input_tokens.store(0, Ordering::Relaxed);
        c.output_tokens.store(0, Ordering::Relaxed);
        c.token_cost_cents.store(0, Ordering::Relaxed);
        c.token_requests.store(0, Ordering::Relaxed);
        c.cpu_percent_bits.store(0, Ordering::Relaxed);
        c.memory_bytes.store(0, Ordering::Relaxed);
    }

    /// Reads every counter. Individual loads are relaxed; the snapshot is
    /// approximate under concurrent writes, which is fine for reporting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.inner;
        let total_requests = c.total_requests.load(Ordering::Relaxed);
        let cache_hits = c.cache_hits.load(Ordering::Relaxed);
        let cache_misses = c.cache_misses.load(Ordering::Relaxed);
        let latency_ns_total = c.latency_ns_total.load(Ordering::Relaxed);
        let latency_count = c.latency_count.load(Ordering::Relaxed);
        let token_cost_cents = c.token_cost_cents.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests,
            cache_hits,
            cache_misses,
            errors: c.errors.load(Ordering::Relaxed),
            hit_ratio: if cache_hits + cache_misses > 0 {
                cache_hits as f64 / (cache_hits + cache_misses) as f64
            } else {
                0.0
            },
            avg_latency_ms: if latency_count > 0 {
                latency_ns_total as f64 / latency_count as f64 / 1_000_000.0
            } else {
                0.0
            },
            input_tokens: c.input_tokens.load(Ordering::Relaxed),
            output_tokens: c.output_tokens.load(Ordering::Relaxed),
            token_requests: c.token_requests.load(Ordering::Relaxed),
            token_cost_cents,
            token_cost_dollars: token_cost_cents as f64 / 100.0,
            cpu_percent: f64::from_bits(c.cpu_percent_bits.load(Ordering::Relaxed)),
            memory_bytes: c.memory_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values, serialized on `/metrics`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    pub hit_ratio: f64,
    pub avg_latency_ms: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub token_requests: u64,
    pub token_cost_cents: u64,
    pub token_cost_dollars: f64,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
}

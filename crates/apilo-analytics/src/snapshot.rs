//! Snapshot types assembled by the analytics engine.

use crate::record::RequestRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Immutable point-in-time view of the analytics state.
///
/// Every field is a deep copy; callers may hold a snapshot while the engine
/// keeps recording.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    /// Last N records, newest first.
    pub recent_requests: Vec<RequestRecord>,
    pub latency_percentiles: LatencyPercentiles,
    pub error_breakdown: HashMap<String, u64>,
    /// Busiest URLs by total requests, capped at ten.
    pub top_urls: Vec<UrlStats>,
    /// Requests per second over the span of the history ring.
    pub request_rate: f64,
    pub cache_efficiency: CacheEfficiency,
    pub time_buckets: TimeBuckets,
    pub token_savings: TokenSavings,
    pub token_usage: TokenUsageSummary,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LatencyPercentiles {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Per-URL aggregate, updated in place on every record.
#[derive(Debug, Clone, Serialize)]
pub struct UrlStats {
    pub url: String,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_latency_ns: u64,
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl UrlStats {
    pub(crate) fn new(url: String) -> Self {
        Self {
            url,
            total_requests: 0,
            cache_hits: 0,
            cache_misses: 0,
            total_latency_ns: 0,
            min_latency_ns: u64::MAX,
            max_latency_ns: 0,
        }
    }

    pub(crate) fn absorb(&mut self, record: &RequestRecord) {
        self.total_requests += 1;
        if record.cache_hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
        self.total_latency_ns += record.latency_ns;
        self.min_latency_ns = self.min_latency_ns.min(record.latency_ns);
        self.max_latency_ns = self.max_latency_ns.max(record.latency_ns);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.total_latency_ns as f64 / self.total_requests as f64 / 1_000_000.0
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheEfficiency {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub avg_hit_latency_ms: f64,
    pub avg_miss_latency_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TimeBuckets {
    pub last_minute: TimeBucket,
    pub last_5_minutes: TimeBucket,
    pub last_hour: TimeBucket,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TimeBucket {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
    /// Requests per second over the bucket's window.
    pub request_rate: f64,
}

/// Savings attributable to cache hits over the rolling window.
///
/// Derived from the history ring, not since-boot totals, so the figures
/// move with the window and are not monotone.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenSavings {
    pub cache_hits: u64,
    pub input_tokens_saved: u64,
    pub output_tokens_saved: u64,
    pub total_tokens_saved: u64,
    pub cost_saved_dollars: f64,
    pub latency_saved_ms: f64,
    pub api_calls_saved: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenUsageSummary {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub requests_with_tokens: u64,
    pub avg_tokens_per_request: f64,
    pub estimated_cost_dollars: f64,
}

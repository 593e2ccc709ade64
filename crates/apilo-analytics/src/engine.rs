//! The analytics engine.

use crate::record::RequestRecord;
use crate::ring::RingBuffer;
use crate::snapshot::{
    AnalyticsSnapshot, CacheEfficiency, LatencyPercentiles, TimeBucket, TimeBuckets,
    TokenSavings, TokenUsageSummary, UrlStats,
};
use apilo_core::TokenPricing;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Default history capacity.
pub(crate) const DEFAULT_CAPACITY: usize = 1000;

/// Default number of recent records in a snapshot.
const DEFAULT_RECENT_LIMIT: usize = 20;

/// Records completed calls and derives rolling statistics.
///
/// One exclusive lock covers both writes and snapshot assembly, so every
/// snapshot is internally consistent. Snapshots are deep copies.
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<Mutex<Inner>>,
    pricing: TokenPricing,
}

struct Inner {
    history: RingBuffer<RequestRecord>,
    latencies: RingBuffer<u64>,
    url_stats: HashMap<String, UrlStats>,
    error_counts: HashMap<String, u64>,
}

impl Analytics {
    /// Creates an engine with the default 1000-record window.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, TokenPricing::default())
    }

    /// Creates an engine with an explicit window size and pricing table.
    pub fn with_capacity(capacity: usize, pricing: TokenPricing) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                history: RingBuffer::new(capacity),
                latencies: RingBuffer::new(capacity),
                url_stats: HashMap::new(),
                error_counts: HashMap::new(),
            })),
            pricing,
        }
    }

    /// Appends one record: history and latency rings, per-URL stats, and
    /// the error-reason map, all under a single lock.
    pub fn record(&self, record: RequestRecord) {
        let mut inner = self.inner.lock();

        inner
            .url_stats
            .entry(record.url.clone())
            .or_insert_with(|| UrlStats::new(record.url.clone()))
            .absorb(&record);

        if let Some(reason) = &record.error {
            *inner.error_counts.entry(reason.clone()).or_insert(0) += 1;
        }

        inner.latencies.push(record.latency_ns);
        inner.history.push(record);
    }

    /// Number of records currently in the window.
    pub fn len(&self) -> usize {
        self.inner.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().history.is_empty()
    }

    /// Assembles a snapshot. `limit` bounds the recent-request list and is
    /// clamped to `1..=capacity`; `None` means the default of 20.
    pub fn snapshot(&self, limit: Option<usize>) -> AnalyticsSnapshot {
        let inner = self.inner.lock();
        let capacity = inner.history.capacity();
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, capacity);

        let mut recent: Vec<RequestRecord> = inner.history.iter().cloned().collect();
        recent.reverse();
        recent.truncate(limit);

        let mut top_urls: Vec<UrlStats> = inner.url_stats.values().cloned().collect();
        top_urls.sort_by(|a, b| b.total_requests.cmp(&a.total_requests));
        top_urls.truncate(10);

        AnalyticsSnapshot {
            recent_requests: recent,
            latency_percentiles: percentiles(&inner.latencies),
            error_breakdown: inner.error_counts.clone(),
            top_urls,
            request_rate: request_rate(&inner.history),
            cache_efficiency: cache_efficiency(&inner.history),
            time_buckets: TimeBuckets {
                last_minute: time_bucket(&inner.history, ChronoDuration::minutes(1)),
                last_5_minutes: time_bucket(&inner.history, ChronoDuration::minutes(5)),
                last_hour: time_bucket(&inner.history, ChronoDuration::hours(1)),
            },
            token_savings: token_savings(&inner.history, &self.pricing),
            token_usage: token_usage(&inner.history, &self.pricing),
        }
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}

/// P50/P95/P99 by sorting a copy of the latency ring and indexing at
/// floor(len * p / 100).
fn percentiles(latencies: &RingBuffer<u64>) -> LatencyPercentiles {
    if latencies.is_empty() {
        return LatencyPercentiles::default();
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let pick = |p: usize| -> f64 {
        let index = (sorted.len() * p / 100).min(sorted.len() - 1);
        sorted[index] as f64 / 1_000_000.0
    };

    LatencyPercentiles {
        p50_ms: pick(50),
        p95_ms: pick(95),
        p99_ms: pick(99),
    }
}

/// Records per second across the window span; zero below two samples.
fn request_rate(history: &RingBuffer<RequestRecord>) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let (Some(first), Some(last)) = (history.front(), history.back()) else {
        return 0.0;
    };
    let span = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0;
    if span <= 0.0 {
        return 0.0;
    }
    history.len() as f64 / span
}

fn cache_efficiency(history: &RingBuffer<RequestRecord>) -> CacheEfficiency {
    let mut eff = CacheEfficiency::default();
    let mut hit_latency_ns: u64 = 0;
    let mut miss_latency_ns: u64 = 0;

    for record in history.iter() {
        eff.total_requests += 1;
        if record.cache_hit {
            eff.cache_hits += 1;
            hit_latency_ns += record.latency_ns;
        } else {
            eff.cache_misses += 1;
            miss_latency_ns += record.latency_ns;
        }
    }

    if eff.total_requests > 0 {
        eff.hit_rate = eff.cache_hits as f64 / eff.total_requests as f64;
        eff.miss_rate = eff.cache_misses as f64 / eff.total_requests as f64;
    }
    if eff.cache_hits > 0 {
        eff.avg_hit_latency_ms = hit_latency_ns as f64 / eff.cache_hits as f64 / 1_000_000.0;
    }
    if eff.cache_misses > 0 {
        eff.avg_miss_latency_ms = miss_latency_ns as f64 / eff.cache_misses as f64 / 1_000_000.0;
    }
    eff
}

fn time_bucket(history: &RingBuffer<RequestRecord>, window: ChronoDuration) -> TimeBucket {
    let cutoff = Utc::now() - window;
    let mut bucket = TimeBucket::default();
    let mut latency_ns: u64 = 0;

    for record in history.iter().filter(|r| r.timestamp >= cutoff) {
        bucket.requests += 1;
        if record.cache_hit {
            bucket.cache_hits += 1;
        } else {
            bucket.cache_misses += 1;
        }
        if record.error.is_some() {
            bucket.errors += 1;
        }
        latency_ns += record.latency_ns;
    }

    if bucket.requests > 0 {
        bucket.avg_latency_ms = latency_ns as f64 / bucket.requests as f64 / 1_000_000.0;
        let window_secs = window.num_milliseconds() as f64 / 1000.0;
        if window_secs > 0.0 {
            bucket.request_rate = bucket.requests as f64 / window_secs;
        }
    }
    bucket
}

/// Savings across the cache hits in the window: tokens that were not
/// re-spent, their cost at the pricing table, and latency avoided relative
/// to the average miss.
fn token_savings(history: &RingBuffer<RequestRecord>, pricing: &TokenPricing) -> TokenSavings {
    let mut savings = TokenSavings::default();
    let mut miss_latency_ns: u64 = 0;
    let mut misses: u64 = 0;

    for record in history.iter() {
        if record.cache_hit {
            savings.cache_hits += 1;
            savings.input_tokens_saved += record.input_tokens;
            savings.output_tokens_saved += record.output_tokens;
        } else {
            misses += 1;
            miss_latency_ns += record.latency_ns;
        }
    }

    savings.total_tokens_saved = savings.input_tokens_saved + savings.output_tokens_saved;
    savings.api_calls_saved = savings.cache_hits;
    savings.cost_saved_dollars =
        pricing.cost_dollars(savings.input_tokens_saved, savings.output_tokens_saved);
    if misses > 0 {
        let avg_miss_ms = miss_latency_ns as f64 / misses as f64 / 1_000_000.0;
        savings.latency_saved_ms = savings.cache_hits as f64 * avg_miss_ms;
    }
    savings
}

fn token_usage(history: &RingBuffer<RequestRecord>, pricing: &TokenPricing) -> TokenUsageSummary {
    let mut usage = TokenUsageSummary::default();

    for record in history.iter() {
        if record.total_tokens > 0 {
            usage.requests_with_tokens += 1;
        }
        usage.total_input_tokens += record.input_tokens;
        usage.total_output_tokens += record.output_tokens;
        usage.total_tokens += record.total_tokens;
    }

    if usage.requests_with_tokens > 0 {
        usage.avg_tokens_per_request =
            usage.total_tokens as f64 / usage.requests_with_tokens as f64;
    }
    usage.estimated_cost_dollars =
        pricing.cost_dollars(usage.total_input_tokens, usage.total_output_tokens);
    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(url: &str, latency_ms: u64, cache_hit: bool) -> RequestRecord {
        RequestRecord {
            timestamp: Utc::now(),
            url: url.to_string(),
            method: "GET".to_string(),
            status: 200,
            latency_ns: latency_ms * 1_000_000,
            cache_hit,
            error: None,
            input_tokens: 10,
            output_tokens: 20,
            total_tokens: 30,
            is_estimated: true,
        }
    }

    #[test]
    fn snapshot_orders_recent_newest_first() {
        let analytics = Analytics::new();
        analytics.record(record("https://a.example/1", 5, false));
        analytics.record(record("https://a.example/2", 5, false));
        analytics.record(record("https://a.example/3", 5, false));

        let snapshot = analytics.snapshot(Some(2));
        assert_eq!(snapshot.recent_requests.len(), 2);
        assert_eq!(snapshot.recent_requests[0].url, "https://a.example/3");
        assert_eq!(snapshot.recent_requests[1].url, "https://a.example/2");
    }

    #[test]
    fn history_is_bounded_by_capacity() {
        let analytics = Analytics::with_capacity(10, TokenPricing::default());
        for i in 0..50 {
            analytics.record(record(&format!("https://a.example/{i}"), 1, false));
        }
        assert_eq!(analytics.len(), 10);

        let snapshot = analytics.snapshot(Some(1000));
        assert_eq!(snapshot.recent_requests.len(), 10);
        assert_eq!(snapshot.recent_requests[0].url, "https://a.example/49");
    }

    #[test]
    fn percentiles_are_monotone() {
        let analytics = Analytics::new();
        for i in 1..=100 {
            analytics.record(record("https://a.example/x", i, false));
        }

        let p = analytics.snapshot(None).latency_percentiles;
        assert!(p.p50_ms <= p.p95_ms);
        assert!(p.p95_ms <= p.p99_ms);
        assert!(p.p99_ms <= 100.0);
        assert!(p.p50_ms >= 1.0);
    }

    #[test]
    fn empty_window_gives_zero_percentiles_and_rate() {
        let analytics = Analytics::new();
        let snapshot = analytics.snapshot(None);
        assert_eq!(snapshot.latency_percentiles.p50_ms, 0.0);
        assert_eq!(snapshot.request_rate, 0.0);
        assert!(snapshot.recent_requests.is_empty());
    }

    #[test]
    fn top_urls_sorted_by_request_count() {
        let analytics = Analytics::new();
        for _ in 0..5 {
            analytics.record(record("https://hot.example/", 1, false));
        }
        for _ in 0..2 {
            analytics.record(record("https://warm.example/", 1, false));
        }
        analytics.record(record("https://cold.example/", 1, false));

        let snapshot = analytics.snapshot(None);
        assert_eq!(snapshot.top_urls[0].url, "https://hot.example/");
        assert_eq!(snapshot.top_urls[0].total_requests, 5);
        assert_eq!(snapshot.top_urls[1].url, "https://warm.example/");
    }

    #[test]
    fn top_urls_truncates_to_ten() {
        let analytics = Analytics::new();
        for i in 0..15 {
            analytics.record(record(&format!("https://u{i}.example/"), 1, false));
        }
        assert_eq!(analytics.snapshot(None).top_urls.len(), 10);
    }

    #[test]
    fn error_reasons_accumulate() {
        let analytics = Analytics::new();
        let mut failed = record("https://a.example/", 1, false);
        failed.error = Some("connection refused".to_string());
        analytics.record(failed.clone());
        analytics.record(failed);

        let snapshot = analytics.snapshot(None);
        assert_eq!(snapshot.error_breakdown["connection refused"], 2);
    }

    #[test]
    fn cache_efficiency_separates_hit_and_miss_latency() {
        let analytics = Analytics::new();
        analytics.record(record("https://a.example/", 2, true));
        analytics.record(record("https://a.example/", 100, false));
        analytics.record(record("https://a.example/", 200, false));

        let eff = analytics.snapshot(None).cache_efficiency;
        assert_eq!(eff.total_requests, 3);
        assert_eq!(eff.cache_hits, 1);
        assert!((eff.hit_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((eff.avg_hit_latency_ms - 2.0).abs() < 1e-9);
        assert!((eff.avg_miss_latency_ms - 150.0).abs() < 1e-9);
    }

    #[test]
    fn token_savings_counts_hits_only() {
        let analytics = Analytics::new();
        analytics.record(record("https://a.example/", 100, false));
        analytics.record(record("https://a.example/", 1, true));
        analytics.record(record("https://a.example/", 1, true));

        let savings = analytics.snapshot(None).token_savings;
        assert_eq!(savings.cache_hits, 2);
        assert_eq!(savings.api_calls_saved, 2);
        assert_eq!(savings.input_tokens_saved, 20);
        assert_eq!(savings.output_tokens_saved, 40);
        assert_eq!(savings.total_tokens_saved, 60);
        // 2 hits * 100ms average miss latency
        assert!((savings.latency_saved_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn time_buckets_cover_recent_records() {
        let analytics = Analytics::new();
        analytics.record(record("https://a.example/", 10, false));
        analytics.record(record("https://a.example/", 10, true));

        let buckets = analytics.snapshot(None).time_buckets;
        assert_eq!(buckets.last_minute.requests, 2);
        assert_eq!(buckets.last_minute.cache_hits, 1);
        assert_eq!(buckets.last_5_minutes.requests, 2);
        assert_eq!(buckets.last_hour.requests, 2);
        assert!(buckets.last_minute.request_rate > 0.0);
    }

    #[test]
    fn snapshots_are_deep_copies() {
        let analytics = Analytics::new();
        analytics.record(record("https://a.example/", 1, false));
        let snapshot = analytics.snapshot(None);

        analytics.record(record("https://b.example/", 1, false));
        assert_eq!(snapshot.recent_requests.len(), 1);
        assert_eq!(snapshot.top_urls.len(), 1);
    }
}

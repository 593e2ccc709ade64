//! Rolling request analytics for the apilo daemon.
//!
//! The engine keeps a bounded history of request records plus a parallel
//! latency ring, and derives snapshots on demand: percentiles, per-URL
//! aggregates, cache efficiency, time-bucketed rates, and token savings
//! over the rolling window. Process-wide atomic counters live alongside in
//! [`DaemonMetrics`], and threshold alert rules are evaluated against their
//! snapshots.

mod alerts;
mod engine;
mod metrics;
mod record;
mod ring;
mod snapshot;

pub use alerts::{
    Alert, AlertComparator, AlertManager, AlertMetric, AlertRule, AlertSeverity,
};
pub use engine::Analytics;
pub use metrics::{DaemonMetrics, MetricsSnapshot};
pub use record::RequestRecord;
pub use ring::RingBuffer;
pub use snapshot::{
    AnalyticsSnapshot, CacheEfficiency, LatencyPercentiles, TimeBucket, TimeBuckets,
    TokenSavings, TokenUsageSummary, UrlStats,
};

//! Events emitted by the response cache.

use apilo_core::ApiloEvent;
use std::time::Instant;

/// Observability events for cache operations.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A lookup found a live entry.
    Hit {
        source: String,
        timestamp: Instant,
        key: String,
    },
    /// A lookup found nothing.
    Miss {
        source: String,
        timestamp: Instant,
        key: String,
    },
    /// A lookup found an entry past its TTL; the entry was removed.
    Expired {
        source: String,
        timestamp: Instant,
        key: String,
    },
    /// An entry was stored or replaced.
    Inserted {
        source: String,
        timestamp: Instant,
        key: String,
        size: usize,
    },
    /// An entry was evicted to make room.
    Evicted {
        source: String,
        timestamp: Instant,
        key: String,
        size: usize,
    },
    /// The policy declined to store a response.
    Rejected {
        source: String,
        timestamp: Instant,
        key: String,
    },
    /// The cache was emptied.
    Cleared {
        source: String,
        timestamp: Instant,
        entries: usize,
    },
}

impl ApiloEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "cache_hit",
            CacheEvent::Miss { .. } => "cache_miss",
            CacheEvent::Expired { .. } => "cache_expired",
            CacheEvent::Inserted { .. } => "cache_inserted",
            CacheEvent::Evicted { .. } => "cache_evicted",
            CacheEvent::Rejected { .. } => "cache_rejected",
            CacheEvent::Cleared { .. } => "cache_cleared",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Expired { timestamp, .. }
            | CacheEvent::Inserted { timestamp, .. }
            | CacheEvent::Evicted { timestamp, .. }
            | CacheEvent::Rejected { timestamp, .. }
            | CacheEvent::Cleared { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CacheEvent::Hit { source, .. }
            | CacheEvent::Miss { source, .. }
            | CacheEvent::Expired { source, .. }
            | CacheEvent::Inserted { source, .. }
            | CacheEvent::Evicted { source, .. }
            | CacheEvent::Rejected { source, .. }
            | CacheEvent::Cleared { source, .. } => source,
        }
    }
}

//! Cached response entries.

use apilo_core::TokenUsage;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A complete cached HTTP response.
///
/// Headers keep the first value seen per name. The byte size charged against
/// the cache's memory budget is the body length; headers are not charged.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub cached_at: Instant,
    pub token_usage: Option<TokenUsage>,
    /// TTL assigned at insert time by the installed policy.
    pub(crate) ttl: Duration,
}

impl CacheEntry {
    /// Creates an entry. The TTL is assigned by the cache on insert.
    pub fn new(
        status: u16,
        headers: HashMap<String, String>,
        body: Bytes,
        token_usage: Option<TokenUsage>,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            cached_at: Instant::now(),
            token_usage,
            ttl: Duration::ZERO,
        }
    }

    /// Bytes charged against the cache budget.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Time since this entry was stored.
    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }

    /// The TTL assigned when the entry was inserted.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.age())
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.age() > self.ttl
    }
}

//! Cache statistics for the control surface.

use serde::Serialize;

/// Point-in-time view of the cache, serialized on `/cache/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub used_bytes: u64,
    pub max_bytes: u64,
    pub used_percent: f64,
    pub default_ttl_secs: u64,
    pub policy: String,
    /// Per-entry detail, most recently used first.
    pub entry_details: Vec<EntryStats>,
}

/// Age and remaining lifetime of one resident entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryStats {
    pub key: String,
    pub size_bytes: usize,
    pub age_secs: f64,
    pub ttl_remaining_secs: f64,
}

//! Memory-bounded response cache for the apilo daemon.
//!
//! The cache maps request fingerprints to complete HTTP responses. It is
//! bounded two ways: a required byte cap on the sum of body sizes and an
//! optional entry-count cap. Eviction is least-recently-used with O(1)
//! recency updates; expiration is lazy, on read. A pluggable [`CachePolicy`]
//! decides per-insert TTL, cacheability, and eviction vetoes.
//!
//! # Example
//!
//! ```rust
//! use apilo_cache::{CacheConfig, CacheEntry};
//! use bytes::Bytes;
//! use std::collections::HashMap;
//! use std::time::Duration;
//!
//! let cache = CacheConfig::builder()
//!     .max_bytes(64 * 1024 * 1024)
//!     .default_ttl(Duration::from_secs(600))
//!     .name("responses")
//!     .build();
//!
//! let entry = CacheEntry::new(200, HashMap::new(), Bytes::from_static(b"hello"), None);
//! cache.set("fingerprint".to_string(), entry).unwrap();
//! assert!(cache.get("fingerprint").is_some());
//! ```

mod config;
mod entry;
mod error;
mod events;
mod policy;
mod shared;
mod stats;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use events::CacheEvent;
pub use policy::{
    default_should_cache, AccessPattern, AdaptivePolicy, CachePolicy, FixedTtlPolicy, LfuPolicy,
    PolicyKind,
};
pub use shared::SharedCache;
pub use stats::{CacheStats, EntryStats};
pub use store::ResponseCache;

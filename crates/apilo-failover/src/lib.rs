//! Failover across a primary upstream and ordered backups.
//!
//! Each candidate service is guarded by its own circuit breaker. A call
//! executes through the currently selected service; when that breaker
//! short-circuits, the manager advances to the next candidate, bounded by
//! the retry budget. A background recovery loop watches breaker health and
//! snaps routing back to the primary once it recovers.
//!
//! ## Example
//!
//! ```rust
//! use apilo_circuitbreaker::CircuitBreakerConfig;
//! use apilo_failover::{FailoverConfig, FailoverStrategy};
//!
//! # async fn example() {
//! let manager = FailoverConfig::<std::io::Error>::builder()
//!     .service("primary", CircuitBreakerConfig::builder().name("primary"))
//!     .service("backup", CircuitBreakerConfig::builder().name("backup"))
//!     .strategy(FailoverStrategy::Immediate)
//!     .max_retries(3)
//!     .build();
//!
//! let result = manager
//!     .call(|_service| async { Ok::<_, std::io::Error>("response") })
//!     .await;
//! assert!(result.is_ok());
//! # }
//! ```

mod config;
mod error;
mod events;
mod manager;

pub use config::{FailoverConfig, FailoverConfigBuilder, FailoverStrategy};
pub use error::FailoverError;
pub use events::FailoverEvent;
pub use manager::FailoverManager;

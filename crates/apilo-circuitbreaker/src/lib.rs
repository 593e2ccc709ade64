//! Circuit breaker protecting a single upstream endpoint.
//!
//! The breaker monitors call outcomes and short-circuits once failures pile
//! up, giving the upstream room to recover.
//!
//! ## States
//! - **Closed**: normal operation, every call passes through
//! - **Open**: calls are rejected immediately with [`CircuitBreakerError::CircuitOpen`]
//! - **HalfOpen**: a bounded number of probe calls test whether the upstream
//!   has recovered
//!
//! Time spent in Open grows exponentially with consecutive trips when
//! backoff is enabled, clamped to a maximum. Every transition bumps a
//! generation counter so callers can detect that the circuit moved while
//! their call was in flight.
//!
//! ## Example
//!
//! ```rust
//! use apilo_circuitbreaker::{CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreakerConfig::<std::io::Error>::builder()
//!     .failure_threshold(5)
//!     .failure_rate(0.5)
//!     .minimum_requests(10)
//!     .open_timeout(Duration::from_secs(30))
//!     .name("origin")
//!     .build();
//!
//! let result: Result<&str, _> = breaker.call(async { Ok("response") }).await;
//! assert!(result.is_ok());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```

mod breaker;
mod circuit;
mod config;
mod error;
mod events;

pub use breaker::CircuitBreaker;
pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, TripContext};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;

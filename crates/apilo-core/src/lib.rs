//! Shared building blocks for the apilo daemon crates.
//!
//! Two things live here: the event-listener system that every subsystem
//! (cache, circuit breaker, failover) uses for observability callbacks, and
//! the token accounting types shared between the optimizer, the cache, and
//! the analytics engine.

mod events;
mod token;

pub use events::{ApiloEvent, BoxedEventListener, EventListener, EventListeners, FnListener};
pub use token::{estimate_tokens, TokenPricing, TokenUsage};

//! Failover configuration.

use crate::events::FailoverEvent;
use crate::manager::{FailoverManager, FailoverService};
use apilo_circuitbreaker::CircuitBreakerConfigBuilder;
use apilo_core::{EventListeners, FnListener};
use std::time::Duration;

/// How the manager moves between candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverStrategy {
    /// Switch to the next candidate on the first short-circuit.
    Immediate,
    /// Retry the current candidate a few times before switching.
    Gradual {
        retries_before_switch: u32,
    },
    /// Rotate through candidates call by call.
    RoundRobin,
    /// Prefer healthy candidates with the highest weight.
    Weighted,
}

/// Configuration for the failover manager.
pub struct FailoverConfig<E> {
    pub(crate) services: Vec<FailoverService<E>>,
    pub(crate) strategy: FailoverStrategy,
    pub(crate) max_retries: u32,
    pub(crate) fallback_enabled: bool,
    pub(crate) health_check_interval: Duration,
    pub(crate) event_listeners: EventListeners<FailoverEvent>,
    pub(crate) name: String,
}

impl<E> FailoverConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> FailoverConfigBuilder<E> {
        FailoverConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a [`FailoverManager`].
pub struct FailoverConfigBuilder<E> {
    services: Vec<FailoverService<E>>,
    strategy: FailoverStrategy,
    max_retries: u32,
    fallback_enabled: bool,
    health_check_interval: Duration,
    event_listeners: EventListeners<FailoverEvent>,
    name: String,
}

impl<E> FailoverConfigBuilder<E> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            strategy: FailoverStrategy::Immediate,
            max_retries: 3,
            fallback_enabled: false,
            health_check_interval: Duration::from_secs(10),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Appends a candidate service. The first registered service is the
    /// primary; the rest are backups in order.
    pub fn service<N: Into<String>>(
        mut self,
        name: N,
        breaker: CircuitBreakerConfigBuilder<E>,
    ) -> Self {
        self.services.push(FailoverService {
            name: name.into(),
            breaker: breaker.build(),
            weight: 1,
        });
        self
    }

    /// Appends a weighted candidate, used by [`FailoverStrategy::Weighted`].
    pub fn weighted_service<N: Into<String>>(
        mut self,
        name: N,
        breaker: CircuitBreakerConfigBuilder<E>,
        weight: u32,
    ) -> Self {
        self.services.push(FailoverService {
            name: name.into(),
            breaker: breaker.build(),
            weight,
        });
        self
    }

    /// Sets the switching strategy.
    ///
    /// Default: `Immediate`
    pub fn strategy(mut self, strategy: FailoverStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Bounds the number of candidates tried per call.
    ///
    /// Default: 3
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Enables fallback mode once the chain is exhausted.
    ///
    /// Default: disabled
    pub fn fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Interval of the background recovery loop.
    ///
    /// Default: 10 seconds
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Give this manager a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Register a callback for service switches.
    pub fn on_service_switched<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &FailoverEvent| {
                if let FailoverEvent::ServiceSwitched { from, to, .. } = event {
                    f(from, to);
                }
            }));
        self
    }

    /// Register a callback for primary restoration.
    pub fn on_primary_restored<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &FailoverEvent| {
                if matches!(event, FailoverEvent::PrimaryRestored { .. }) {
                    f();
                }
            }));
        self
    }

    /// Builds the failover manager.
    ///
    /// # Panics
    ///
    /// Panics if no service was registered.
    pub fn build(self) -> FailoverManager<E> {
        assert!(
            !self.services.is_empty(),
            "at least one service must be registered before building"
        );

        FailoverManager::new(FailoverConfig {
            services: self.services,
            strategy: self.strategy,
            max_retries: self.max_retries,
            fallback_enabled: self.fallback_enabled,
            health_check_interval: self.health_check_interval,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}

impl<E> Default for FailoverConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

//! Circuit breaker configuration.

use crate::breaker::CircuitBreaker;
use crate::events::CircuitBreakerEvent;
use apilo_core::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Classifier deciding which errors count as failures.
pub(crate) type FailureClassifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Inputs to a custom trip predicate.
#[derive(Debug, Clone, Copy)]
pub struct TripContext {
    pub total_calls: u64,
    pub failure_count: u64,
    pub success_count: u64,
    pub failure_rate: f64,
}

pub(crate) type TripPredicate = Arc<dyn Fn(&TripContext) -> bool + Send + Sync>;

/// Configuration for a circuit breaker instance.
pub struct CircuitBreakerConfig<E> {
    pub(crate) failure_threshold: u64,
    pub(crate) failure_rate: f64,
    pub(crate) minimum_requests: u64,
    pub(crate) open_timeout: Duration,
    pub(crate) backoff_enabled: bool,
    pub(crate) backoff_multiplier: f64,
    pub(crate) max_backoff: Duration,
    pub(crate) half_open_max_requests: u64,
    pub(crate) half_open_success_threshold: u64,
    pub(crate) is_failure: FailureClassifier<E>,
    pub(crate) trip_predicate: Option<TripPredicate>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl<E> CircuitBreakerConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<E> {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a [`CircuitBreaker`].
pub struct CircuitBreakerConfigBuilder<E> {
    failure_threshold: u64,
    failure_rate: f64,
    minimum_requests: u64,
    open_timeout: Duration,
    backoff_enabled: bool,
    backoff_multiplier: f64,
    max_backoff: Duration,
    half_open_max_requests: u64,
    half_open_success_threshold: u64,
    is_failure: FailureClassifier<E>,
    trip_predicate: Option<TripPredicate>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl<E> CircuitBreakerConfigBuilder<E> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate: 0.5,
            minimum_requests: 10,
            open_timeout: Duration::from_secs(30),
            backoff_enabled: true,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(300),
            half_open_max_requests: 1,
            half_open_success_threshold: 1,
            is_failure: Arc::new(|_| true),
            trip_predicate: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Absolute failure count at which the circuit opens.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: u64) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Failure rate (0.0 to 1.0) at which the circuit opens.
    ///
    /// Default: 0.5
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    /// Minimum calls in the window before trip conditions are evaluated.
    ///
    /// Default: 10
    pub fn minimum_requests(mut self, n: u64) -> Self {
        self.minimum_requests = n;
        self
    }

    /// Base duration the circuit stays open before probing.
    ///
    /// Default: 30 seconds
    pub fn open_timeout(mut self, duration: Duration) -> Self {
        self.open_timeout = duration;
        self
    }

    /// Enables or disables exponential open-timeout backoff.
    ///
    /// Default: enabled
    pub fn backoff_enabled(mut self, enabled: bool) -> Self {
        self.backoff_enabled = enabled;
        self
    }

    /// Multiplier applied to the open timeout per consecutive trip.
    ///
    /// Default: 2.0
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Upper clamp on the backed-off open timeout.
    ///
    /// Default: 5 minutes
    pub fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Number of concurrent probes admitted in the half-open state.
    ///
    /// Default: 1
    pub fn half_open_max_requests(mut self, n: u64) -> Self {
        self.half_open_max_requests = n;
        self
    }

    /// Probe successes required to close the circuit.
    ///
    /// Default: 1
    pub fn half_open_success_threshold(mut self, n: u64) -> Self {
        self.half_open_success_threshold = n;
        self
    }

    /// Sets a custom failure classifier.
    ///
    /// Default: every error counts as a failure. Use this to exclude
    /// categories such as client-side cancellation.
    pub fn is_failure<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_failure = Arc::new(classifier);
        self
    }

    /// Replaces the default trip condition entirely.
    pub fn trip_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TripContext) -> bool + Send + Sync + 'static,
    {
        self.trip_predicate = Some(Arc::new(predicate));
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Register a callback for state transitions.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::CircuitState, crate::CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Register a callback for rejected calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Register a callback for recorded failures.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    pub(crate) fn into_config(self) -> CircuitBreakerConfig<E> {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            failure_rate: self.failure_rate,
            minimum_requests: self.minimum_requests,
            open_timeout: self.open_timeout,
            backoff_enabled: self.backoff_enabled,
            backoff_multiplier: self.backoff_multiplier,
            max_backoff: self.max_backoff,
            half_open_max_requests: self.half_open_max_requests,
            half_open_success_threshold: self.half_open_success_threshold,
            is_failure: self.is_failure,
            trip_predicate: self.trip_predicate,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the circuit breaker.
    pub fn build(self) -> CircuitBreaker<E> {
        CircuitBreaker::new(self.into_config())
    }
}

impl<E> Default for CircuitBreakerConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

//! The breaker state machine.

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rolling latency window size for the average-latency metric.
const LATENCY_WINDOW: usize = 100;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of probes are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Snapshot of breaker counters for observability.
///
/// All fields are read in one critical section, so the snapshot is
/// internally consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    /// Bumped on every transition; lets callers detect the circuit moved.
    pub generation: u64,
    /// Calls recorded in the current window (reset on transition).
    pub total_calls: u64,
    pub failure_count: u64,
    pub success_count: u64,
    pub half_open_probes: u64,
    pub half_open_successes: u64,
    /// Lifetime count of short-circuited calls.
    pub rejected_calls: u64,
    /// Lifetime count of state transitions.
    pub state_changes: u64,
    pub closed_entries: u64,
    pub open_entries: u64,
    pub half_open_entries: u64,
    pub failure_rate: f64,
    pub average_latency: Duration,
    pub time_since_state_change: Duration,
}

/// Why `try_acquire` refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    Open,
    HalfOpenLimit,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    generation: u64,
    last_state_change: Instant,
    last_failure: Option<Instant>,
    /// Consecutive trips to Open since the circuit last closed; the backoff
    /// exponent.
    consecutive_opens: u32,
    total_count: u64,
    failure_count: u64,
    success_count: u64,
    half_open_inflight: u64,
    half_open_probes: u64,
    half_open_successes: u64,
    rejected_calls: u64,
    state_changes: u64,
    closed_entries: u64,
    open_entries: u64,
    half_open_entries: u64,
    latencies: VecDeque<Duration>,
}

impl Circuit {
    pub(crate) fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            generation: 0,
            last_state_change: Instant::now(),
            last_failure: None,
            consecutive_opens: 0,
            total_count: 0,
            failure_count: 0,
            success_count: 0,
            half_open_inflight: 0,
            half_open_probes: 0,
            half_open_successes: 0,
            rejected_calls: 0,
            state_changes: 0,
            closed_entries: 0,
            open_entries: 0,
            half_open_entries: 0,
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        let failure_rate = if self.total_count > 0 {
            self.failure_count as f64 / self.total_count as f64
        } else {
            0.0
        };
        let average_latency = if self.latencies.is_empty() {
            Duration::ZERO
        } else {
            self.latencies.iter().sum::<Duration>() / self.latencies.len() as u32
        };

        CircuitMetrics {
            state: self.state,
            generation: self.generation,
            total_calls: self.total_count,
            failure_count: self.failure_count,
            success_count: self.success_count,
            half_open_probes: self.half_open_probes,
            half_open_successes: self.half_open_successes,
            rejected_calls: self.rejected_calls,
            state_changes: self.state_changes,
            closed_entries: self.closed_entries,
            open_entries: self.open_entries,
            half_open_entries: self.half_open_entries,
            failure_rate,
            average_latency,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Effective time the circuit stays open before probing: the configured
    /// timeout scaled exponentially by consecutive trips, clamped.
    fn effective_open_timeout<E>(&self, config: &CircuitBreakerConfig<E>) -> Duration {
        if !config.backoff_enabled || self.consecutive_opens <= 1 {
            return config.open_timeout;
        }
        let exponent = (self.consecutive_opens - 1) as i32;
        let scaled = config
            .open_timeout
            .mul_f64(config.backoff_multiplier.powi(exponent));
        scaled.min(config.max_backoff)
    }

    /// Admits or rejects a call. On success returns the generation the
    /// caller must hand back when recording the outcome.
    pub(crate) fn try_acquire<E>(
        &mut self,
        config: &CircuitBreakerConfig<E>,
    ) -> Result<u64, Rejection> {
        match self.state {
            CircuitState::Closed => {
                self.emit_permitted(config);
                Ok(self.generation)
            }
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= self.effective_open_timeout(config) {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.half_open_inflight += 1;
                    self.half_open_probes += 1;
                    self.emit_permitted(config);
                    Ok(self.generation)
                } else {
                    self.rejected_calls += 1;
                    self.emit_rejected(config);
                    Err(Rejection::Open)
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_inflight < config.half_open_max_requests {
                    self.half_open_inflight += 1;
                    self.half_open_probes += 1;
                    self.emit_permitted(config);
                    Ok(self.generation)
                } else {
                    self.rejected_calls += 1;
                    self.emit_rejected(config);
                    Err(Rejection::HalfOpenLimit)
                }
            }
        }
    }

    pub(crate) fn record_success<E>(
        &mut self,
        generation: u64,
        latency: Duration,
        config: &CircuitBreakerConfig<E>,
    ) {
        // The circuit moved while this call was in flight; its counters were
        // reset and this outcome no longer describes the current window.
        if generation != self.generation {
            return;
        }

        self.push_latency(latency);
        self.success_count += 1;
        self.total_count += 1;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                source: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
                latency,
            });

        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_inflight = self.half_open_inflight.saturating_sub(1);
                self.half_open_successes += 1;
                if self.half_open_successes >= config.half_open_success_threshold {
                    self.transition_to(CircuitState::Closed, config);
                }
            }
            CircuitState::Closed => self.evaluate_trip(config),
            CircuitState::Open => {}
        }
    }

    pub(crate) fn record_failure<E>(
        &mut self,
        generation: u64,
        latency: Duration,
        config: &CircuitBreakerConfig<E>,
    ) {
        if generation != self.generation {
            return;
        }

        self.push_latency(latency);
        self.failure_count += 1;
        self.total_count += 1;
        self.last_failure = Some(Instant::now());

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                source: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
                latency,
            });

        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_inflight = self.half_open_inflight.saturating_sub(1);
                self.transition_to(CircuitState::Open, config);
            }
            CircuitState::Closed => self.evaluate_trip(config),
            CircuitState::Open => {}
        }
    }

    /// Performs a due Open -> HalfOpen transition and returns the state the
    /// breaker would present to a caller right now. Used by health checks
    /// that observe the breaker without sending a probe.
    pub(crate) fn poll_recovery<E>(&mut self, config: &CircuitBreakerConfig<E>) -> CircuitState {
        if self.state == CircuitState::Open
            && self.last_state_change.elapsed() >= self.effective_open_timeout(config)
        {
            self.transition_to(CircuitState::HalfOpen, config);
        }
        self.state
    }

    pub(crate) fn force_open<E>(&mut self, config: &CircuitBreakerConfig<E>) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn reset<E>(&mut self, config: &CircuitBreakerConfig<E>) {
        self.transition_to(CircuitState::Closed, config);
    }

    fn push_latency(&mut self, latency: Duration) {
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
    }

    fn evaluate_trip<E>(&mut self, config: &CircuitBreakerConfig<E>) {
        if self.total_count < config.minimum_requests {
            return;
        }

        let failure_rate = self.failure_count as f64 / self.total_count as f64;
        let should_trip = match &config.trip_predicate {
            Some(predicate) => predicate(&crate::config::TripContext {
                total_calls: self.total_count,
                failure_count: self.failure_count,
                success_count: self.success_count,
                failure_rate,
            }),
            None => {
                self.failure_count >= config.failure_threshold
                    || failure_rate >= config.failure_rate
            }
        };

        if should_trip {
            self.transition_to(CircuitState::Open, config);
        }
    }

    fn transition_to<E>(&mut self, state: CircuitState, config: &CircuitBreakerConfig<E>) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.generation += 1;
        self.state_changes += 1;
        self.last_state_change = Instant::now();
        self.total_count = 0;
        self.failure_count = 0;
        self.success_count = 0;
        self.half_open_inflight = 0;
        self.half_open_successes = 0;

        match state {
            CircuitState::Closed => {
                self.closed_entries += 1;
                self.consecutive_opens = 0;
            }
            CircuitState::Open => {
                self.open_entries += 1;
                self.consecutive_opens = self.consecutive_opens.saturating_add(1);
            }
            CircuitState::HalfOpen => {
                self.half_open_entries += 1;
                self.half_open_probes = 0;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = ?from_state,
            to = ?state,
            generation = self.generation,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "apilo_circuit_transitions_total",
            "breaker" => config.name.clone(),
            "to" => match state {
                CircuitState::Closed => "closed",
                CircuitState::Open => "open",
                CircuitState::HalfOpen => "half_open",
            }
        )
        .increment(1);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                source: config.name.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
                generation: self.generation,
            });
    }

    fn emit_permitted<E>(&self, config: &CircuitBreakerConfig<E>) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallPermitted {
                source: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });
    }

    fn emit_rejected<E>(&self, config: &CircuitBreakerConfig<E>) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallRejected {
                source: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });
    }
}

//! The public breaker façade.

use crate::circuit::{Circuit, CircuitMetrics, CircuitState, Rejection};
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerError;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A cloneable circuit breaker guarding one upstream endpoint.
///
/// The authoritative state lives behind a short mutex so state and
/// generation always advance together; a mirrored atomic serves lock-free
/// [`state`](CircuitBreaker::state) reads.
pub struct CircuitBreaker<E> {
    config: Arc<CircuitBreakerConfig<E>>,
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
}

impl<E> Clone for CircuitBreaker<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            circuit: Arc::clone(&self.circuit),
            state_atomic: Arc::clone(&self.state_atomic),
        }
    }
}

impl<E> CircuitBreaker<E> {
    pub(crate) fn new(config: CircuitBreakerConfig<E>) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            config: Arc::new(config),
            circuit: Arc::new(Mutex::new(Circuit::new_with_atomic(Arc::clone(
                &state_atomic,
            )))),
            state_atomic,
        }
    }

    /// Current state, read without taking the lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Current generation; bumped on every transition.
    pub fn generation(&self) -> u64 {
        self.circuit.lock().generation()
    }

    /// Name given to this breaker at build time.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Consistent snapshot of the breaker's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.circuit.lock().metrics()
    }

    /// State the breaker would present to a caller right now, performing a
    /// due Open -> HalfOpen transition first. Unlike [`state`](Self::state),
    /// an Open breaker whose wait has elapsed reads as HalfOpen here.
    pub fn probe_state(&self) -> CircuitState {
        self.circuit.lock().poll_recovery(&self.config)
    }

    /// Healthy means the breaker would admit at least a probe: Closed or
    /// HalfOpen (including a due transition out of Open).
    pub fn is_healthy(&self) -> bool {
        self.probe_state() != CircuitState::Open
    }

    /// Trips the circuit regardless of counters.
    pub fn force_open(&self) {
        self.circuit.lock().force_open(&self.config);
    }

    /// Closes the circuit and resets counters.
    pub fn reset(&self) {
        self.circuit.lock().reset(&self.config);
    }

    /// Runs `fut` through the breaker.
    ///
    /// The future is only constructed by the caller; when the circuit is
    /// open or the half-open probe budget is spent, it is dropped unpolled
    /// and the call returns the matching rejection. Outcomes are classified
    /// by the configured `is_failure` predicate; an outcome that arrives
    /// after the circuit moved on (generation mismatch) is discarded.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let generation = match self.circuit.lock().try_acquire(&self.config) {
            Ok(generation) => generation,
            Err(Rejection::Open) => return Err(CircuitBreakerError::CircuitOpen),
            Err(Rejection::HalfOpenLimit) => {
                return Err(CircuitBreakerError::HalfOpenLimitExceeded)
            }
        };

        let start = Instant::now();
        let result = fut.await;
        let latency = start.elapsed();

        let is_failure = match &result {
            Err(error) => (self.config.is_failure)(error),
            Ok(_) => false,
        };

        let mut circuit = self.circuit.lock();
        if is_failure {
            circuit.record_failure(generation, latency, &self.config);
        } else {
            circuit.record_success(generation, latency, &self.config);
        }
        drop(circuit);

        result.map_err(CircuitBreakerError::Inner)
    }
}

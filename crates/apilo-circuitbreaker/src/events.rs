//! Events emitted by the circuit breaker.

use crate::circuit::CircuitState;
use apilo_core::ApiloEvent;
use std::time::{Duration, Instant};

/// Observability events for breaker activity.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        source: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
        generation: u64,
    },
    /// A call was admitted.
    CallPermitted {
        source: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected without reaching upstream.
    CallRejected {
        source: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A permitted call completed successfully.
    SuccessRecorded {
        source: String,
        timestamp: Instant,
        state: CircuitState,
        latency: Duration,
    },
    /// A permitted call failed per the failure classifier.
    FailureRecorded {
        source: String,
        timestamp: Instant,
        state: CircuitState,
        latency: Duration,
    },
}

impl ApiloEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { source, .. }
            | CircuitBreakerEvent::CallPermitted { source, .. }
            | CircuitBreakerEvent::CallRejected { source, .. }
            | CircuitBreakerEvent::SuccessRecorded { source, .. }
            | CircuitBreakerEvent::FailureRecorded { source, .. } => source,
        }
    }
}

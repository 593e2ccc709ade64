//! Events emitted by the failover manager.

use apilo_core::ApiloEvent;
use std::time::Instant;

/// Observability events for routing decisions.
#[derive(Debug, Clone)]
pub enum FailoverEvent {
    /// Routing advanced from one service to another.
    ServiceSwitched {
        source: String,
        timestamp: Instant,
        from: String,
        to: String,
    },
    /// The recovery loop routed traffic back to the primary.
    PrimaryRestored {
        source: String,
        timestamp: Instant,
    },
    /// The chain was exhausted and fallback mode engaged.
    FallbackActivated {
        source: String,
        timestamp: Instant,
    },
}

impl ApiloEvent for FailoverEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FailoverEvent::ServiceSwitched { .. } => "service_switched",
            FailoverEvent::PrimaryRestored { .. } => "primary_restored",
            FailoverEvent::FallbackActivated { .. } => "fallback_activated",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FailoverEvent::ServiceSwitched { timestamp, .. }
            | FailoverEvent::PrimaryRestored { timestamp, .. }
            | FailoverEvent::FallbackActivated { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            FailoverEvent::ServiceSwitched { source, .. }
            | FailoverEvent::PrimaryRestored { source, .. }
            | FailoverEvent::FallbackActivated { source, .. } => source,
        }
    }
}

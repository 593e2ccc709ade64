//! The failover manager.

use crate::config::{FailoverConfig, FailoverStrategy};
use crate::error::FailoverError;
use crate::events::FailoverEvent;
use apilo_circuitbreaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// One candidate upstream: a name, its guarding breaker, and a weight for
/// the weighted strategy.
pub(crate) struct FailoverService<E> {
    pub(crate) name: String,
    pub(crate) breaker: CircuitBreaker<E>,
    pub(crate) weight: u32,
}

/// Routes calls across a primary service and ordered backups.
///
/// The first registered service is the primary. Calls execute through the
/// selected service's breaker; breaker rejections advance the chain, bounded
/// by the retry budget.
pub struct FailoverManager<E> {
    inner: Arc<Inner<E>>,
}

struct Inner<E> {
    config: FailoverConfig<E>,
    current: AtomicUsize,
    round_robin_cursor: AtomicUsize,
}

impl<E> Clone for FailoverManager<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> FailoverManager<E> {
    pub(crate) fn new(config: FailoverConfig<E>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                current: AtomicUsize::new(0),
                round_robin_cursor: AtomicUsize::new(0),
            }),
        }
    }

    /// Name of the service calls currently route to.
    pub fn current_service(&self) -> &str {
        let index = self.inner.current.load(Ordering::Acquire);
        &self.inner.config.services[index].name
    }

    /// True while calls route to the primary.
    pub fn on_primary(&self) -> bool {
        self.inner.current.load(Ordering::Acquire) == 0
    }

    /// Breaker state per candidate, primary first.
    pub fn service_states(&self) -> Vec<(String, CircuitState)> {
        self.inner
            .config
            .services
            .iter()
            .map(|s| (s.name.clone(), s.breaker.state()))
            .collect()
    }

    /// Runs `op` through the failover chain.
    ///
    /// `op` is invoked once per attempted candidate with that candidate's
    /// name. Breaker rejections advance the chain; upstream errors surface
    /// verbatim from the last candidate actually reached, and
    /// [`FailoverError::AllServicesDown`] is returned when every candidate
    /// short-circuited.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, FailoverError<E>>
    where
        F: FnMut(&str) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let config = &self.inner.config;
        let service_count = config.services.len();
        let max_attempts = config.max_retries.max(1);

        let mut index = self.select_start();
        let mut attempts = 0u32;
        let mut same_service_retries = 0u32;
        let mut last_inner: Option<E> = None;

        while attempts < max_attempts {
            attempts += 1;
            let service = &config.services[index];

            match service.breaker.call(op(&service.name)).await {
                Ok(value) => {
                    if config.strategy != FailoverStrategy::RoundRobin {
                        self.inner.current.store(index, Ordering::Release);
                    }
                    return Ok(value);
                }
                Err(CircuitBreakerError::Inner(error)) => {
                    last_inner = Some(error);
                    if let FailoverStrategy::Gradual {
                        retries_before_switch,
                    } = config.strategy
                    {
                        if same_service_retries < retries_before_switch {
                            same_service_retries += 1;
                            continue;
                        }
                    }
                    // An upstream failure with no other candidate is final;
                    // retrying the same service is the Gradual strategy's
                    // job, not the chain's.
                    let Some(next) = self.advance(index, service_count) else {
                        break;
                    };
                    index = next;
                    same_service_retries = 0;
                }
                Err(_rejection) => {
                    let Some(next) = self.advance(index, service_count) else {
                        break;
                    };
                    index = next;
                    same_service_retries = 0;
                }
            }
        }

        if config.fallback_enabled {
            config.event_listeners.emit(&FailoverEvent::FallbackActivated {
                source: config.name.clone(),
                timestamp: Instant::now(),
            });
            return Err(FailoverError::FallbackUnavailable);
        }

        match last_inner {
            Some(error) => Err(FailoverError::Inner(error)),
            None => Err(FailoverError::AllServicesDown),
        }
    }

    /// Like [`call`](Self::call), but produces `fallback` instead of the
    /// marker error once the chain is exhausted with fallback enabled.
    pub async fn call_with_fallback<T, F, Fut, FB>(
        &self,
        op: F,
        fallback: FB,
    ) -> Result<T, FailoverError<E>>
    where
        F: FnMut(&str) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> Option<T>,
    {
        match self.call(op).await {
            Err(FailoverError::FallbackUnavailable) => {
                fallback().ok_or(FailoverError::FallbackUnavailable)
            }
            other => other,
        }
    }

    fn select_start(&self) -> usize {
        let config = &self.inner.config;
        let service_count = config.services.len();

        match config.strategy {
            FailoverStrategy::RoundRobin => {
                self.inner.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % service_count
            }
            FailoverStrategy::Weighted => {
                let healthy_heaviest = config
                    .services
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.breaker.state() != CircuitState::Open)
                    .max_by_key(|(_, s)| s.weight)
                    .map(|(i, _)| i);
                healthy_heaviest.unwrap_or_else(|| self.inner.current.load(Ordering::Acquire))
            }
            _ => self.inner.current.load(Ordering::Acquire),
        }
    }

    fn advance(&self, index: usize, service_count: usize) -> Option<usize> {
        let next = (index + 1) % service_count;
        if next == index {
            return None;
        }
        let config = &self.inner.config;
        #[cfg(feature = "tracing")]
        tracing::warn!(
            manager = %config.name,
            from = %config.services[index].name,
            to = %config.services[next].name,
            "failing over to next service"
        );
        config.event_listeners.emit(&FailoverEvent::ServiceSwitched {
            source: config.name.clone(),
            timestamp: Instant::now(),
            from: config.services[index].name.clone(),
            to: config.services[next].name.clone(),
        });
        if config.strategy != FailoverStrategy::RoundRobin {
            self.inner.current.store(next, Ordering::Release);
        }
        Some(next)
    }
}

impl<E: Send + Sync + 'static> FailoverManager<E> {
    /// Spawns the recovery loop: every `health_check_interval`, snap routing
    /// back to the primary once its breaker reports healthy (Closed or
    /// HalfOpen). Runs until `shutdown` fires.
    pub fn spawn_recovery(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.inner.config.health_check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => manager.check_primary(),
                }
            }
        })
    }

    fn check_primary(&self) {
        let config = &self.inner.config;
        if self.inner.current.load(Ordering::Acquire) == 0 {
            return;
        }
        if config.services[0].breaker.is_healthy() {
            self.inner.current.store(0, Ordering::Release);
            #[cfg(feature = "tracing")]
            tracing::info!(manager = %config.name, "primary recovered; routing restored");
            config.event_listeners.emit(&FailoverEvent::PrimaryRestored {
                source: config.name.clone(),
                timestamp: Instant::now(),
            });
        }
    }
}

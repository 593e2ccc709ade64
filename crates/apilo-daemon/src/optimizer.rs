//! The request optimization pipeline: fingerprint, cache lookup, upstream
//! execution over pooled connections, cache insertion, and recording.

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::fingerprint::fingerprint;
use apilo_analytics::{Analytics, DaemonMetrics, RequestRecord};
use apilo_cache::{CacheEntry, SharedCache};
use apilo_circuitbreaker::CircuitBreakerConfig;
use apilo_core::{TokenPricing, TokenUsage};
use apilo_failover::{FailoverConfig, FailoverError, FailoverManager};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default total timeout for one upstream call.
const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by [`Optimizer::optimize`].
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("failed reading upstream response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    #[error("all services down; no upstream accepted the call")]
    AllServicesDown,

    #[error("request cancelled")]
    Cancelled,
}

/// One call through the pipeline.
#[derive(Debug, Clone)]
pub struct OptimizerRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

/// What a completed call looks like to the control surface.
#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub latency: Duration,
    pub cache_hit: bool,
    pub optimized: bool,
    pub connection_reused: bool,
    pub http2_used: bool,
    pub token_usage: Option<TokenUsage>,
}

impl OptimizeOutcome {
    pub fn cache_status(&self) -> &'static str {
        if self.cache_hit {
            "hit"
        } else {
            "miss"
        }
    }

    pub fn optimization_type(&self) -> &'static str {
        if self.cache_hit {
            "cache"
        } else if self.connection_reused {
            "connection-reuse"
        } else {
            "passthrough"
        }
    }
}

struct UpstreamResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
    http2_used: bool,
}

/// The pipeline itself. Cloning is cheap; all state is shared.
pub struct Optimizer {
    client: reqwest::Client,
    cache: SharedCache,
    analytics: Analytics,
    metrics: DaemonMetrics,
    failover: Option<FailoverManager<OptimizeError>>,
    pricing: TokenPricing,
    idle_timeout: Duration,
    /// Last successful call per host, for the connection-reuse flag.
    host_last_use: Mutex<HashMap<String, Instant>>,
}

impl Optimizer {
    pub fn new(
        config: &DaemonConfig,
        cache: SharedCache,
        analytics: Analytics,
        metrics: DaemonMetrics,
    ) -> Result<Self, DaemonError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(config.idle_timeout())
            .timeout(DEFAULT_UPSTREAM_TIMEOUT);
        if !config.enable_http2 {
            builder = builder.http1_only();
        }
        let client = builder
            .build()
            .map_err(|e| DaemonError::ConfigInvalid(format!("http client: {e}")))?;

        let failover = config.enable_circuit_breaker.then(|| {
            FailoverConfig::builder()
                .service(
                    "origin",
                    CircuitBreakerConfig::builder()
                        .name("origin")
                        // Cancellation is a caller decision, not upstream health.
                        .is_failure(|e: &OptimizeError| {
                            !matches!(e, OptimizeError::Cancelled)
                        }),
                )
                .name("upstream")
                .build()
        });

        Ok(Self {
            client,
            cache,
            analytics,
            metrics,
            failover,
            pricing: config.token_pricing,
            idle_timeout: config.idle_timeout(),
            host_last_use: Mutex::new(HashMap::new()),
        })
    }

    /// The failover manager, when the circuit breaker is enabled; the
    /// supervisor spawns its recovery loop.
    pub fn failover(&self) -> Option<&FailoverManager<OptimizeError>> {
        self.failover.as_ref()
    }

    /// Runs one request through the pipeline.
    ///
    /// A cache hit returns the synthesized response without touching the
    /// upstream. A miss executes the upstream call (through the failover
    /// chain when enabled), estimates token usage, inserts into the cache,
    /// and records the call. Errors are recorded and never cached, and a
    /// cancelled call never inserts.
    pub async fn optimize(
        &self,
        request: OptimizerRequest,
        cancel: CancellationToken,
    ) -> Result<OptimizeOutcome, OptimizeError> {
        let started = Instant::now();
        let key = fingerprint(
            &request.method,
            &request.url,
            &request.headers,
            &request.body,
        );

        if let Some(entry) = self.cache.get(&key) {
            let latency = started.elapsed();
            let outcome = OptimizeOutcome {
                status: entry.status,
                headers: entry.headers.clone(),
                body: entry.body.clone(),
                latency,
                cache_hit: true,
                optimized: true,
                connection_reused: true,
                http2_used: false,
                token_usage: entry.token_usage,
            };
            self.record(&request, &outcome, None);
            return Ok(outcome);
        }

        let response = self.execute(&request, &cancel).await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                if !matches!(error, OptimizeError::Cancelled) {
                    self.record_failure(&request, started.elapsed(), &error);
                }
                return Err(error);
            }
        };

        let latency = started.elapsed();
        let usage = TokenUsage::estimated(&request.body, &response.body);
        let connection_reused = self.note_host_use(&request.url);

        // A cancelled call must leave no cache side effect.
        if !cancel.is_cancelled() {
            let entry = CacheEntry::new(
                response.status,
                response.headers.clone(),
                response.body.clone(),
                Some(usage),
            );
            match self.cache.set(key, entry) {
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(error = %err, url = %request.url, "response not cached");
                }
            }
        }

        let outcome = OptimizeOutcome {
            status: response.status,
            headers: response.headers,
            body: response.body,
            latency,
            cache_hit: false,
            optimized: connection_reused,
            connection_reused,
            http2_used: response.http2_used,
            token_usage: Some(usage),
        };
        self.record(&request, &outcome, Some(&usage));
        Ok(outcome)
    }

    async fn execute(
        &self,
        request: &OptimizerRequest,
        cancel: &CancellationToken,
    ) -> Result<UpstreamResponse, OptimizeError> {
        match &self.failover {
            Some(manager) => {
                let result = manager
                    .call(|_service| {
                        execute_upstream(self.client.clone(), request.clone(), cancel.clone())
                    })
                    .await;
                match result {
                    Ok(response) => Ok(response),
                    Err(FailoverError::Inner(error)) => Err(error),
                    Err(FailoverError::AllServicesDown)
                    | Err(FailoverError::FallbackUnavailable) => {
                        Err(OptimizeError::AllServicesDown)
                    }
                }
            }
            None => execute_upstream(self.client.clone(), request.clone(), cancel.clone()).await,
        }
    }

    /// Marks the host used and reports whether an idle connection was
    /// plausibly available (a successful call within the idle window).
    fn note_host_use(&self, url: &str) -> bool {
        let host = match reqwest::Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => format!("{}:{}", host, parsed.port_or_known_default().unwrap_or(0)),
                None => return false,
            },
            Err(_) => return false,
        };

        let mut hosts = self.host_last_use.lock();
        let now = Instant::now();
        let reused = hosts
            .get(&host)
            .is_some_and(|last| now.duration_since(*last) < self.idle_timeout);
        hosts.insert(host, now);
        reused
    }

    fn record(
        &self,
        request: &OptimizerRequest,
        outcome: &OptimizeOutcome,
        spent: Option<&TokenUsage>,
    ) {
        let usage = outcome.token_usage.unwrap_or(TokenUsage {
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            is_estimated: false,
        });
        self.analytics.record(RequestRecord {
            timestamp: Utc::now(),
            url: request.url.clone(),
            method: request.method.clone(),
            status: outcome.status,
            latency_ns: outcome.latency.as_nanos() as u64,
            cache_hit: outcome.cache_hit,
            error: None,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            is_estimated: usage.is_estimated,
        });
        self.metrics
            .record_request(outcome.latency.as_nanos() as u64, outcome.cache_hit, false);
        if let Some(spent) = spent {
            self.metrics.record_tokens(spent, &self.pricing);
        }
    }

    fn record_failure(&self, request: &OptimizerRequest, latency: Duration, error: &OptimizeError) {
        self.analytics.record(RequestRecord {
            timestamp: Utc::now(),
            url: request.url.clone(),
            method: request.method.clone(),
            status: 0,
            latency_ns: latency.as_nanos() as u64,
            cache_hit: false,
            error: Some(error.to_string()),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            is_estimated: false,
        });
        self.metrics
            .record_request(latency.as_nanos() as u64, false, true);
    }
}

/// One upstream HTTP exchange: build, send, read the body into memory,
/// keep the first value per header name.
async fn execute_upstream(
    client: reqwest::Client,
    request: OptimizerRequest,
    cancel: CancellationToken,
) -> Result<UpstreamResponse, OptimizeError> {
    let method =
        reqwest::Method::from_bytes(request.method.as_bytes()).unwrap_or(reqwest::Method::GET);

    let mut header_map = HeaderMap::new();
    for (name, value) in &request.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            header_map.insert(name, value);
        }
    }

    let mut builder = client
        .request(method, &request.url)
        .headers(header_map)
        .body(request.body.clone());
    if let Some(timeout) = request.timeout {
        builder = builder.timeout(timeout);
    }

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(OptimizeError::Cancelled),
        response = builder.send() => response.map_err(OptimizeError::Upstream)?,
    };

    let status = response.status().as_u16();
    let http2_used = response.version() == reqwest::Version::HTTP_2;

    let mut headers = HashMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(OptimizeError::Cancelled),
        body = response.bytes() => body.map_err(OptimizeError::BodyRead)?,
    };

    Ok(UpstreamResponse {
        status,
        headers,
        body,
        http2_used,
    })
}

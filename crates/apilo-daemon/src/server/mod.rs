//! The loopback control server.

use crate::config::DaemonConfig;
use crate::optimizer::Optimizer;
use apilo_analytics::{AlertManager, Analytics, DaemonMetrics};
use apilo_cache::SharedCache;
use axum::middleware as mw;
use axum::routing::{get, post};
use axum::Router;
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

pub mod handlers;
mod middleware;
pub mod types;

/// Per-I/O-phase deadline for control handlers.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

/// History window of the analytics engine.
const ANALYTICS_CAPACITY: usize = 1000;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub optimizer: Arc<Optimizer>,
    pub cache: SharedCache,
    pub analytics: Analytics,
    pub metrics: DaemonMetrics,
    pub alerts: AlertManager,
    pub config: Arc<RwLock<DaemonConfig>>,
    pub started_at: Instant,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires the full component stack described by `config`.
    pub fn new(
        config: DaemonConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, crate::error::DaemonError> {
        let cache = apilo_cache::CacheConfig::builder()
            .max_bytes(config.cache_max_bytes())
            .default_ttl(config.cache_ttl())
            .name("responses")
            .build();
        let analytics = Analytics::with_capacity(ANALYTICS_CAPACITY, config.token_pricing);
        let metrics = DaemonMetrics::new();
        let alerts = AlertManager::with_default_rules();
        let optimizer = Arc::new(Optimizer::new(
            &config,
            cache.clone(),
            analytics.clone(),
            metrics.clone(),
        )?);

        Ok(Self {
            optimizer,
            cache,
            analytics,
            metrics,
            alerts,
            config: Arc::new(RwLock::new(config)),
            started_at: Instant::now(),
            shutdown,
        })
    }
}

/// Builds the control router. Method mismatches answer 405 via axum's
/// method routing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/status", get(handlers::get_status))
        .route("/metrics", get(handlers::get_metrics))
        .route("/analytics", get(handlers::get_analytics))
        .route("/requests", get(handlers::get_requests))
        .route("/cache/stats", get(handlers::get_cache_stats))
        .route("/cache/invalidate", post(handlers::post_cache_invalidate))
        .route(
            "/config",
            get(handlers::get_config).put(handlers::put_config),
        )
        .route("/optimize", post(handlers::post_optimize))
        .route("/internal/record", post(handlers::post_internal_record))
        .route("/alerts", get(handlers::get_alerts))
        .route(
            "/alerts/acknowledge",
            post(handlers::post_alert_acknowledge),
        )
        .layer(mw::from_fn(middleware::log_requests))
        .layer(TimeoutLayer::new(HANDLER_TIMEOUT))
        .with_state(state)
}

/// Serves the control surface until `shutdown` fires, then drains
/// gracefully. The caller bounds the drain.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

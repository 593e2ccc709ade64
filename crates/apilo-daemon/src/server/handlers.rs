//! Control surface handlers.

use crate::optimizer::OptimizerRequest;
use crate::server::types::{
    HealthResponse, OptimizeRequestBody, OptimizeResponseBody, StatusResponse, StatusTokens,
};
use crate::server::AppState;
use apilo_analytics::{Alert, AnalyticsSnapshot, MetricsSnapshot, RequestRecord};
use apilo_cache::CacheStats;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: VERSION,
    })
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let metrics = state.metrics.snapshot();
    let port = state.config.read().port;

    let tokens = (metrics.token_requests > 0).then(|| StatusTokens {
        input_tokens: metrics.input_tokens,
        output_tokens: metrics.output_tokens,
        cost_dollars: metrics.token_cost_dollars,
    });

    Json(StatusResponse {
        running: true,
        pid: std::process::id(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        port,
        total_requests: metrics.total_requests,
        cache_hits: metrics.cache_hits,
        cache_misses: metrics.cache_misses,
        hit_ratio: metrics.hit_ratio,
        avg_latency_ms: metrics.avg_latency_ms,
        memory_mb: metrics.memory_bytes as f64 / 1024.0 / 1024.0,
        cpu_percent: metrics.cpu_percent,
        tokens,
    })
}

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub async fn get_analytics(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<AnalyticsSnapshot> {
    Json(state.analytics.snapshot(query.limit))
}

pub async fn get_requests(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<serde_json::Value> {
    let snapshot = state.analytics.snapshot(Some(query.limit.unwrap_or(100)));
    Json(json!({
        "recent_requests": snapshot.recent_requests,
        "cache_efficiency": snapshot.cache_efficiency,
        "token_savings": snapshot.token_savings,
    }))
}

#[derive(Deserialize)]
pub struct FormatQuery {
    pub format: Option<String>,
}

pub async fn get_cache_stats(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
) -> Response {
    let stats = state.cache.stats();
    match query.format.as_deref() {
        Some("visual") => render_cache_table(&stats).into_response(),
        _ => Json(stats).into_response(),
    }
}

/// Plain-text cache view for terminal inspection.
fn render_cache_table(stats: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "cache: {} entries, {:.1} MiB / {:.1} MiB ({:.1}%), policy {}, default ttl {}s",
        stats.entries,
        stats.used_bytes as f64 / 1024.0 / 1024.0,
        stats.max_bytes as f64 / 1024.0 / 1024.0,
        stats.used_percent,
        stats.policy,
        stats.default_ttl_secs,
    );
    let _ = writeln!(out, "{:<20} {:>12} {:>10} {:>10}", "KEY", "SIZE", "AGE", "TTL LEFT");
    for entry in &stats.entry_details {
        let key = if entry.key.len() > 16 {
            format!("{}...", &entry.key[..16])
        } else {
            entry.key.clone()
        };
        let _ = writeln!(
            out,
            "{:<20} {:>12} {:>9.1}s {:>9.1}s",
            key, entry.size_bytes, entry.age_secs, entry.ttl_remaining_secs,
        );
    }
    out
}

pub async fn post_cache_invalidate(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.cache.clear();
    Json(json!({"status": "cache invalidated"}))
}

pub async fn get_config(State(state): State<AppState>) -> Json<crate::config::DaemonConfig> {
    Json(state.config.read().clone())
}

pub async fn put_config(
    State(state): State<AppState>,
    payload: Result<Json<crate::config::DaemonConfig>, JsonRejection>,
) -> Response {
    let Json(config) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };

    if let Err(err) = config.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": err.to_string()})),
        )
            .into_response();
    }

    *state.config.write() = config.clone();
    tracing::info!("configuration updated; some fields apply on restart");
    Json(config).into_response()
}

pub async fn post_optimize(
    State(state): State<AppState>,
    payload: Result<Json<OptimizeRequestBody>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };

    let request = OptimizerRequest {
        method: body.method,
        url: body.url,
        headers: body.headers,
        body: body.body.map(Bytes::from).unwrap_or_default(),
        timeout: body.timeout_secs.map(Duration::from_secs),
    };

    // Child token: daemon shutdown cancels in-flight optimizations.
    let cancel = state.shutdown.child_token();
    match state.optimizer.optimize(request, cancel).await {
        Ok(outcome) => Json(OptimizeResponseBody::from(&outcome)).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

pub async fn post_internal_record(
    State(state): State<AppState>,
    payload: Result<Json<RequestRecord>, JsonRejection>,
) -> Response {
    let Json(record) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };

    state
        .metrics
        .record_request(record.latency_ns, record.cache_hit, record.error.is_some());
    state.analytics.record(record);
    Json(json!({"status": "recorded"})).into_response()
}

pub async fn get_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.alerts.alerts())
}

#[derive(Deserialize)]
pub struct AcknowledgeQuery {
    pub rule: String,
}

pub async fn post_alert_acknowledge(
    State(state): State<AppState>,
    Query(query): Query<AcknowledgeQuery>,
) -> Response {
    if state.alerts.acknowledge(&query.rule) {
        Json(json!({"status": "acknowledged"})).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("no active alert for rule '{}'", query.rule)})),
        )
            .into_response()
    }
}

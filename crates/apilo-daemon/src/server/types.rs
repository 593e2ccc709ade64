//! Wire types for the control surface.

use crate::optimizer::OptimizeOutcome;
use apilo_core::TokenUsage;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_method() -> String {
    "GET".to_string()
}

/// `POST /optimize` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeRequestBody {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// `POST /optimize` response body. The upstream body travels
/// base64-encoded.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeResponseBody {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub latency_ms: f64,
    pub cache_hit: bool,
    pub optimized: bool,
    pub metadata: OptimizeMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizeMetadata {
    pub cache_status: String,
    pub optimization_type: String,
    pub connection_reused: bool,
    pub http2_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl From<&OptimizeOutcome> for OptimizeResponseBody {
    fn from(outcome: &OptimizeOutcome) -> Self {
        Self {
            status_code: outcome.status,
            headers: outcome.headers.clone(),
            body: BASE64.encode(&outcome.body),
            latency_ms: outcome.latency.as_secs_f64() * 1000.0,
            cache_hit: outcome.cache_hit,
            optimized: outcome.optimized,
            metadata: OptimizeMetadata {
                cache_status: outcome.cache_status().to_string(),
                optimization_type: outcome.optimization_type().to_string(),
                connection_reused: outcome.connection_reused,
                http2_used: outcome.http2_used,
                token_usage: outcome.token_usage,
            },
            error: None,
        }
    }
}

/// `GET /health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub version: &'static str,
}

/// `GET /status` response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub pid: u32,
    pub uptime_secs: u64,
    pub port: u16,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_ratio: f64,
    pub avg_latency_ms: f64,
    pub memory_mb: f64,
    pub cpu_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<StatusTokens>,
}

#[derive(Debug, Serialize)]
pub struct StatusTokens {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_dollars: f64,
}

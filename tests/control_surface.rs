use apilo_daemon::server::{self, AppState};
use apilo_daemon::DaemonConfig;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_control(config: DaemonConfig) -> (SocketAddr, AppState, CancellationToken) {
    let shutdown = CancellationToken::new();
    let state = AppState::new(config, shutdown.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, state.clone(), shutdown.clone()));

    (addr, state, shutdown)
}

fn base64_decode(value: &str) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .unwrap()
}

#[tokio::test]
async fn health_reports_uptime_and_version() {
    let (addr, _state, shutdown) = start_control(DaemonConfig::default()).await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "healthy");
    assert!(body["version"].as_str().unwrap().contains('.'));
    shutdown.cancel();
}

#[tokio::test]
async fn optimize_misses_then_serves_from_cache() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&upstream)
        .await;

    let (addr, state, shutdown) = start_control(DaemonConfig::default()).await;
    let client = reqwest::Client::new();
    let request = serde_json::json!({
        "url": format!("{}/v1/data", upstream.uri()),
        "method": "GET",
    });

    let first: serde_json::Value = client
        .post(format!("http://{addr}/optimize"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["cache_hit"], false);
    assert_eq!(first["status_code"], 200);
    assert_eq!(first["metadata"]["cache_status"], "miss");
    assert_eq!(base64_decode(first["body"].as_str().unwrap()), b"hello");

    let second: serde_json::Value = client
        .post(format!("http://{addr}/optimize"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["cache_hit"], true);
    assert_eq!(second["optimized"], true);
    assert_eq!(second["metadata"]["cache_status"], "hit");
    assert_eq!(second["metadata"]["connection_reused"], true);
    assert_eq!(base64_decode(second["body"].as_str().unwrap()), b"hello");
    assert!(second["latency_ms"].as_f64().unwrap() < 50.0);

    assert_eq!(state.cache.len(), 1);
    shutdown.cancel();
}

#[tokio::test]
async fn cache_stats_and_invalidate_round_trip() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .mount(&upstream)
        .await;

    let (addr, _state, shutdown) = start_control(DaemonConfig::default()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/optimize"))
        .json(&serde_json::json!({"url": upstream.uri()}))
        .send()
        .await
        .unwrap();

    let stats: serde_json::Value = client
        .get(format!("http://{addr}/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["entries"], 1);
    assert_eq!(stats["used_bytes"], 7);

    let visual = client
        .get(format!("http://{addr}/cache/stats?format=visual"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(visual.contains("cache: 1 entries"));
    assert!(visual.contains("KEY"));

    let invalidated: serde_json::Value = client
        .post(format!("http://{addr}/cache/invalidate"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(invalidated["status"], "cache invalidated");

    let stats: serde_json::Value = client
        .get(format!("http://{addr}/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["entries"], 0);
    shutdown.cancel();
}

#[tokio::test]
async fn config_put_validates_and_applies() {
    let (addr, _state, shutdown) = start_control(DaemonConfig::default()).await;
    let client = reqwest::Client::new();

    let current: serde_json::Value = client
        .get(format!("http://{addr}/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["port"], 9876);

    // Out-of-range port: rejected with 400, config unchanged.
    let response = client
        .put(format!("http://{addr}/config"))
        .json(&serde_json::json!({"port": 80}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Malformed JSON: also 400.
    let response = client
        .put(format!("http://{addr}/config"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let mut updated = DaemonConfig::default();
    updated.cache_ttl_secs = 120;
    let response: serde_json::Value = client
        .put(format!("http://{addr}/config"))
        .json(&updated)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["cache_ttl_secs"], 120);

    let current: serde_json::Value = client
        .get(format!("http://{addr}/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["cache_ttl_secs"], 120);
    shutdown.cancel();
}

#[tokio::test]
async fn internal_record_feeds_analytics_and_metrics() {
    let (addr, _state, shutdown) = start_control(DaemonConfig::default()).await;
    let client = reqwest::Client::new();

    let record = serde_json::json!({
        "timestamp": "2026-08-01T10:00:00Z",
        "url": "https://api.example.com/v1/messages",
        "method": "POST",
        "status": 200,
        "latency_ns": 250_000_000u64,
        "cache_hit": false,
        "input_tokens": 120,
        "output_tokens": 480,
        "total_tokens": 600,
        "is_estimated": false
    });

    let response: serde_json::Value = client
        .post(format!("http://{addr}/internal/record"))
        .json(&record)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["status"], "recorded");

    let metrics: serde_json::Value = client
        .get(format!("http://{addr}/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["total_requests"], 1);

    let analytics: serde_json::Value = client
        .get(format!("http://{addr}/analytics?limit=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        analytics["recent_requests"][0]["url"],
        "https://api.example.com/v1/messages"
    );
    assert_eq!(analytics["top_urls"][0]["total_requests"], 1);
    shutdown.cancel();
}

#[tokio::test]
async fn requests_endpoint_reports_savings() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
        .mount(&upstream)
        .await;

    let (addr, _state, shutdown) = start_control(DaemonConfig::default()).await;
    let client = reqwest::Client::new();
    let request = serde_json::json!({"url": upstream.uri()});

    for _ in 0..3 {
        client
            .post(format!("http://{addr}/optimize"))
            .json(&request)
            .send()
            .await
            .unwrap();
    }

    let body: serde_json::Value = client
        .get(format!("http://{addr}/requests?limit=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["recent_requests"].as_array().unwrap().len(), 3);
    assert_eq!(body["cache_efficiency"]["cache_hits"], 2);
    assert_eq!(body["token_savings"]["api_calls_saved"], 2);
    assert!(body["token_savings"]["cost_saved_dollars"].as_f64().unwrap() >= 0.0);
    shutdown.cancel();
}

#[tokio::test]
async fn method_mismatch_answers_405() {
    let (addr, _state, shutdown) = start_control(DaemonConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/optimize"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    let response = client
        .post(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
    shutdown.cancel();
}

#[tokio::test]
async fn optimize_failure_answers_500_with_description() {
    let (addr, _state, shutdown) = start_control(DaemonConfig {
        enable_circuit_breaker: false,
        ..DaemonConfig::default()
    })
    .await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/optimize"))
        .json(&serde_json::json!({"url": "http://127.0.0.1:1/nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("upstream"));
    shutdown.cancel();
}

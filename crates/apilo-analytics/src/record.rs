//! Request records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed optimization call.
///
/// Exactly one record is appended per call; the history ring drops the
/// oldest record on overflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub latency_ns: u64,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub is_estimated: bool,
}

impl RequestRecord {
    pub fn latency_ms(&self) -> f64 {
        self.latency_ns as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_json() {
        let record = RequestRecord {
            timestamp: Utc::now(),
            url: "https://api.example.com/v1".to_string(),
            method: "POST".to_string(),
            status: 200,
            latency_ns: 12_000_000,
            cache_hit: false,
            error: None,
            input_tokens: 100,
            output_tokens: 200,
            total_tokens: 300,
            is_estimated: true,
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: RequestRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.url, record.url);
        assert_eq!(back.total_tokens, 300);
        assert!((back.latency_ms() - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn minimal_wire_record_fills_defaults() {
        let json = r#"{
            "timestamp": "2026-01-01T00:00:00Z",
            "url": "https://api.example.com/v1",
            "method": "GET",
            "status": 200,
            "latency_ns": 1000,
            "cache_hit": true
        }"#;
        let record: RequestRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.input_tokens, 0);
        assert!(record.error.is_none());
        assert!(!record.is_estimated);
    }
}

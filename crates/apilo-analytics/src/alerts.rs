//! Threshold alerts over metric snapshots.

use crate::metrics::MetricsSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which metric a rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    ErrorRate,
    CacheHitRatio,
    AvgLatencyMs,
    MemoryBytes,
    CpuPercent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertComparator {
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A threshold rule evaluated on each sampler tick.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRule {
    pub name: String,
    pub metric: AlertMetric,
    pub threshold: f64,
    pub comparator: AlertComparator,
    pub severity: AlertSeverity,
    /// Minimum time between two triggers of this rule.
    #[serde(skip)]
    pub cooldown: Duration,
    pub enabled: bool,
}

/// A triggered rule. At most one alert per rule is active at a time.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub rule_name: String,
    pub severity: AlertSeverity,
    pub triggered_at: DateTime<Utc>,
    /// Metric value at trigger time.
    pub value: f64,
    pub active: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Evaluates rules against snapshots and tracks alert lifecycle.
#[derive(Clone)]
pub struct AlertManager {
    inner: Arc<Mutex<AlertState>>,
}

struct AlertState {
    rules: Vec<AlertRule>,
    alerts: HashMap<String, Alert>,
    last_trigger: HashMap<String, Instant>,
}

impl AlertManager {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AlertState {
                rules,
                alerts: HashMap::new(),
                last_trigger: HashMap::new(),
            })),
        }
    }

    /// A small built-in rule set: error rate above 10%, hit ratio below
    /// 10%, average latency above 5 s.
    pub fn with_default_rules() -> Self {
        Self::new(vec![
            AlertRule {
                name: "high-error-rate".to_string(),
                metric: AlertMetric::ErrorRate,
                threshold: 0.10,
                comparator: AlertComparator::GreaterThan,
                severity: AlertSeverity::Critical,
                cooldown: Duration::from_secs(300),
                enabled: true,
            },
            AlertRule {
                name: "low-hit-ratio".to_string(),
                metric: AlertMetric::CacheHitRatio,
                threshold: 0.10,
                comparator: AlertComparator::LessThan,
                severity: AlertSeverity::Info,
                cooldown: Duration::from_secs(600),
                enabled: true,
            },
            AlertRule {
                name: "high-latency".to_string(),
                metric: AlertMetric::AvgLatencyMs,
                threshold: 5000.0,
                comparator: AlertComparator::GreaterThan,
                severity: AlertSeverity::Warning,
                cooldown: Duration::from_secs(300),
                enabled: true,
            },
        ])
    }

    /// Evaluates every enabled rule against a snapshot, triggering and
    /// resolving alerts as thresholds are crossed.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) {
        let mut state = self.inner.lock();
        let rules = state.rules.clone();

        for rule in rules.iter().filter(|r| r.enabled) {
            let value = metric_value(rule.metric, snapshot);
            let breached = match rule.comparator {
                AlertComparator::GreaterThan => value > rule.threshold,
                AlertComparator::LessThan => value < rule.threshold,
            };

            let already_active = state
                .alerts
                .get(&rule.name)
                .is_some_and(|alert| alert.active);

            if breached && !already_active {
                let in_cooldown = state
                    .last_trigger
                    .get(&rule.name)
                    .is_some_and(|at| at.elapsed() < rule.cooldown);
                if in_cooldown {
                    continue;
                }
                state.last_trigger.insert(rule.name.clone(), Instant::now());
                state.alerts.insert(
                    rule.name.clone(),
                    Alert {
                        rule_name: rule.name.clone(),
                        severity: rule.severity,
                        triggered_at: Utc::now(),
                        value,
                        active: true,
                        acknowledged_at: None,
                        resolved_at: None,
                    },
                );
            } else if !breached && already_active {
                if let Some(alert) = state.alerts.get_mut(&rule.name) {
                    alert.active = false;
                    alert.resolved_at = Some(Utc::now());
                }
            }
        }
    }

    /// All alerts, active first, then by trigger time descending.
    pub fn alerts(&self) -> Vec<Alert> {
        let state = self.inner.lock();
        let mut alerts: Vec<Alert> = state.alerts.values().cloned().collect();
        alerts.sort_by(|a, b| {
            b.active
                .cmp(&a.active)
                .then(b.triggered_at.cmp(&a.triggered_at))
        });
        alerts
    }

    /// Currently active alerts.
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts().into_iter().filter(|a| a.active).collect()
    }

    /// Marks the active alert for `rule_name` acknowledged. Returns false
    /// when there is none.
    pub fn acknowledge(&self, rule_name: &str) -> bool {
        let mut state = self.inner.lock();
        match state.alerts.get_mut(rule_name) {
            Some(alert) if alert.active && alert.acknowledged_at.is_none() => {
                alert.acknowledged_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }
}

fn metric_value(metric: AlertMetric, snapshot: &MetricsSnapshot) -> f64 {
    match metric {
        AlertMetric::ErrorRate => {
            if snapshot.total_requests > 0 {
                snapshot.errors as f64 / snapshot.total_requests as f64
            } else {
                0.0
            }
        }
        AlertMetric::CacheHitRatio => snapshot.hit_ratio,
        AlertMetric::AvgLatencyMs => snapshot.avg_latency_ms,
        AlertMetric::MemoryBytes => snapshot.memory_bytes as f64,
        AlertMetric::CpuPercent => snapshot.cpu_percent,
    }
}

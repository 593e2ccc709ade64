//! Daemon configuration.

use crate::error::DaemonError;
use apilo_core::TokenPricing;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The full daemon configuration, as served and accepted on `/config`.
///
/// Durations are integer seconds on the wire; the cache budget is MiB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Control server port, loopback only.
    pub port: u16,
    pub log_level: String,
    pub log_file: String,
    pub pid_file: String,
    pub cache_max_mb: u64,
    pub cache_ttl_secs: u64,
    /// Idle connections kept per upstream host.
    pub max_connections: usize,
    pub idle_timeout_secs: u64,
    pub enable_http2: bool,
    pub enable_circuit_breaker: bool,
    pub metrics_enabled: bool,
    pub token_pricing: TokenPricing,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: 9876,
            log_level: "info".to_string(),
            log_file: "~/.apilo/logs/daemon.log".to_string(),
            pid_file: "~/.apilo/daemon.pid".to_string(),
            cache_max_mb: 500,
            cache_ttl_secs: 600,
            max_connections: 20,
            idle_timeout_secs: 90,
            enable_http2: true,
            enable_circuit_breaker: true,
            metrics_enabled: true,
            token_pricing: TokenPricing::default(),
        }
    }
}

impl DaemonConfig {
    /// Rejects configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.port < 1024 {
            return Err(DaemonError::ConfigInvalid(format!(
                "port {} out of range; expected 1024-65535",
                self.port
            )));
        }
        if self.cache_max_mb == 0 {
            return Err(DaemonError::ConfigInvalid(
                "cache_max_mb must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_max_bytes(&self) -> u64 {
        self.cache_max_mb * 1024 * 1024
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn log_file_path(&self) -> PathBuf {
        expand_tilde(&self.log_file)
    }

    pub fn pid_file_path(&self) -> PathBuf {
        expand_tilde(&self.pid_file)
    }
}

/// Expands a leading `~/` against the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DaemonConfig::default();
        assert_eq!(config.port, 9876);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cache_max_mb, 500);
        assert_eq!(config.cache_ttl_secs, 600);
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.idle_timeout_secs, 90);
        assert!(config.enable_http2);
        assert!(config.enable_circuit_breaker);
        assert!(config.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn privileged_ports_are_rejected() {
        let config = DaemonConfig {
            port: 80,
            ..DaemonConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DaemonError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DaemonConfig = serde_json::from_str(r#"{"port": 9999}"#).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.cache_max_mb, 500);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = DaemonConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: DaemonConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn tilde_expansion_leaves_absolute_paths_alone() {
        assert_eq!(
            expand_tilde("/var/log/apilo.log"),
            PathBuf::from("/var/log/apilo.log")
        );
        if dirs::home_dir().is_some() {
            let expanded = expand_tilde("~/.apilo/daemon.pid");
            assert!(!expanded.to_string_lossy().starts_with('~'));
        }
    }

    #[test]
    fn mib_conversion() {
        let config = DaemonConfig {
            cache_max_mb: 2,
            ..DaemonConfig::default()
        };
        assert_eq!(config.cache_max_bytes(), 2 * 1024 * 1024);
    }
}

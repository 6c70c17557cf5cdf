//! Configuration file support for p2psyncd
//!
//! Loads and validates p2psyncd configuration from TOML files.
//! Default location: /etc/sonic/p2psyncd.conf

use crate::error::{P2pSyncError, Result};
use crate::group_matcher::ControlInterface;
use crate::tables::ANY_CONTROL_INTERFACE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/p2psyncd.conf";

/// Peer-group routing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct P2pRouteConfig {
    /// P2P master control interface to track
    #[serde(default = "default_control_interface")]
    pub control_interface: String,

    /// Interval between periodic link re-queries, 0 disables them
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Time allowed for a link dump to complete
    #[serde(default = "default_dump_timeout")]
    pub dump_timeout_ms: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Redis host
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Redis database number for CONFIG_DB
    #[serde(default = "default_config_db_number")]
    pub config_db_number: u32,
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    /// Serve /metrics
    #[serde(default)]
    pub enabled: bool,

    /// Listen address of the metrics endpoint
    #[serde(default = "default_metrics_addr")]
    pub listen_addr: SocketAddr,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete p2psyncd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct P2pSyncConfig {
    /// Peer-group routing configuration
    #[serde(default)]
    pub p2p_route: P2pRouteConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_control_interface() -> String {
    ANY_CONTROL_INTERFACE.to_string()
}

fn default_resync_interval() -> u64 {
    30
}

fn default_dump_timeout() -> u64 {
    2000
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_config_db_number() -> u32 {
    4
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from((Ipv6Addr::LOCALHOST, 9105))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for P2pRouteConfig {
    fn default() -> Self {
        Self {
            control_interface: default_control_interface(),
            resync_interval_secs: default_resync_interval(),
            dump_timeout_ms: default_dump_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            config_db_number: default_config_db_number(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_addr(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl P2pSyncConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| P2pSyncError::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| {
                P2pSyncError::Configuration(format!("{}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(P2pSyncError::Io(e)),
        }
    }

    /// Validated control interface
    pub fn control_interface(&self) -> Result<ControlInterface> {
        ControlInterface::parse(&self.p2p_route.control_interface)
    }

    /// Periodic re-query interval, `None` when disabled
    pub fn resync_interval(&self) -> Option<Duration> {
        match self.p2p_route.resync_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Link dump timeout as Duration
    pub fn dump_timeout(&self) -> Duration {
        Duration::from_millis(self.p2p_route.dump_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.control_interface()?;

        if self.p2p_route.dump_timeout_ms == 0 {
            return Err(P2pSyncError::Configuration(
                "dump_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.database.redis_port == 0 {
            return Err(P2pSyncError::Configuration(
                "redis_port must be > 0".to_string(),
            ));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(P2pSyncError::Configuration(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = P2pSyncConfig::default();
        assert_eq!(config.p2p_route.control_interface, "all");
        assert_eq!(config.database.redis_port, 6379);
        assert_eq!(config.database.config_db_number, 4);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resync_interval() {
        let mut config = P2pSyncConfig::default();
        assert_eq!(config.resync_interval(), Some(Duration::from_secs(30)));
        config.p2p_route.resync_interval_secs = 0;
        assert_eq!(config.resync_interval(), None);
    }

    #[test]
    fn test_dump_timeout_duration() {
        let config = P2pSyncConfig::default();
        assert_eq!(config.dump_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_toml_deserialization() {
        let config = P2pSyncConfig::from_toml(
            r#"
[p2p_route]
control_interface = "wlan0"

[database]
redis_port = 6380
"#,
        )
        .unwrap();
        assert_eq!(config.p2p_route.control_interface, "wlan0");
        assert_eq!(config.database.redis_port, 6380);
        assert_eq!(config.database.redis_host, "127.0.0.1");
        assert_eq!(config.p2p_route.resync_interval_secs, 30);
        assert_eq!(
            config.control_interface().unwrap(),
            ControlInterface::Named("wlan0".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_bad_control_interface() {
        let mut config = P2pSyncConfig::default();
        config.p2p_route.control_interface = String::new();
        assert!(config.validate().is_err());
        config.p2p_route.control_interface = "wlan*".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_redis_port() {
        let mut config = P2pSyncConfig::default();
        config.database.redis_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_log_level() {
        let mut config = P2pSyncConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = P2pSyncConfig::load_or_default("/nonexistent/p2psyncd.conf").unwrap();
        assert_eq!(config, P2pSyncConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[p2p_route]\ncontrol_interface = \"wlan1\"").unwrap();
        let config = P2pSyncConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.p2p_route.control_interface, "wlan1");
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[p2p_route\ncontrol_interface = ").unwrap();
        assert!(P2pSyncConfig::load_or_default(file.path()).is_err());
    }
}

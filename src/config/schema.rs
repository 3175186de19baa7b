//! Configuration schema definitions.
//!
//! This module defines the configuration structure for a set of containers.
//! All types derive Serde traits for deserialization from config files.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default request body limit for every engine (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Logging settings.
    pub logging: LoggingConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// One entry per container, each with its own listeners.
    pub containers: Vec<ContainerConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level directive used when `RUST_LOG` is unset (e.g. "info", "portico=debug").
    pub level: String,

    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests to finish.
    pub timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

/// Engine backing a container.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Axum,
    Hyper,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Axum => "axum",
            EngineKind::Hyper => "hyper",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how a container listens.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP address to bind (e.g. "0.0.0.0").
    pub address: String,

    /// Ports to bind on `address`; 0 picks an ephemeral port.
    pub ports: Vec<u16>,

    /// Serve HTTPS on every port.
    pub enable_tls: bool,

    /// PEM certificate chain, required with `enable_tls`.
    pub cert_file: String,

    /// PEM private key, required with `enable_tls`.
    pub key_file: String,
}

impl ListenerConfig {
    /// Socket addresses for every configured port.
    pub fn socket_addrs(&self) -> Result<Vec<SocketAddr>, std::net::AddrParseError> {
        let ip: IpAddr = self.address.parse()?;
        Ok(self.ports.iter().map(|port| SocketAddr::new(ip, *port)).collect())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            ports: Vec::new(),
            enable_tls: false,
            cert_file: String::new(),
            key_file: String::new(),
        }
    }
}

/// Container configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContainerConfig {
    /// Container identifier for logging.
    pub name: String,

    /// Engine serving this container.
    #[serde(default)]
    pub engine: EngineKind,

    /// Listener settings, written inline in the container table.
    #[serde(flatten)]
    pub listener: ListenerConfig,

    /// Request body limit in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Named filters applied to the routes the binary mounts.
    #[serde(default)]
    pub filters: Vec<String>,
}

impl ContainerConfig {
    pub fn new(name: impl Into<String>, engine: EngineKind) -> Self {
        Self {
            name: name.into(),
            engine,
            listener: ListenerConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            filters: Vec::new(),
        }
    }
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.shutdown.timeout(), Duration::from_secs(5));
        assert!(config.containers.is_empty());
    }

    #[test]
    fn test_container_table_is_flat() {
        let config: ServerConfig = toml::from_str(
            r#"
            [[containers]]
            name = "public"
            engine = "hyper"
            address = "127.0.0.1"
            ports = [8080, 8081]
            filters = ["request_id"]
            "#,
        )
        .unwrap();

        let container = &config.containers[0];
        assert_eq!(container.engine, EngineKind::Hyper);
        assert_eq!(container.listener.ports, vec![8080, 8081]);
        assert!(!container.listener.enable_tls);
        assert_eq!(container.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(
            container.listener.socket_addrs().unwrap(),
            vec!["127.0.0.1:8080".parse().unwrap(), "127.0.0.1:8081".parse().unwrap()]
        );
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str(
            r#"
            [[containers]]
            name = "x"
            engine = "gin"
            ports = [1]
            "#,
        );
        assert!(result.is_err());
    }
}

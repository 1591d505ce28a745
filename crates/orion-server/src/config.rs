//! Configuration file management.
//!
//! Options are read from a TOML file and keep their recognized
//! camelCase names on disk:
//!
//! ```toml
//! httpPort = 5980
//! udpPort = 5990
//! ptpmServerConnectTimeoutMs = 300000
//! ptpmConnectRequestIntervalMs = 10000
//! ptpmConnectTimeoutMs = 300000
//! ```
//!
//! Every option has a default; a missing file means an all-default
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use orion_core::MediationConfig;

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Control-channel (HTTP + WebSocket) listen port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Datagram listen port.
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// Capture deadline: how long mediation waits for every member's
    /// datagram, in milliseconds.
    #[serde(default = "default_capture_timeout_ms")]
    pub ptpm_server_connect_timeout_ms: u64,
    /// Reminder interval for uncaptured members, in milliseconds.
    #[serde(default = "default_reminder_interval_ms")]
    pub ptpm_connect_request_interval_ms: u64,
    /// Peer-connect deadline: how long mediation waits for every
    /// member's connectivity ack, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub ptpm_connect_timeout_ms: u64,
}

// Default value functions

fn default_http_port() -> u16 {
    5980
}

fn default_udp_port() -> u16 {
    5990
}

fn default_capture_timeout_ms() -> u64 {
    300_000
}

fn default_reminder_interval_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    300_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            udp_port: default_udp_port(),
            ptpm_server_connect_timeout_ms: default_capture_timeout_ms(),
            ptpm_connect_request_interval_ms: default_reminder_interval_ms(),
            ptpm_connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default config file location.
    ///
    /// The path comes from the `ORION_CONFIG` environment variable,
    /// falling back to `orion.toml` in the working directory. A
    /// missing file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(Self::from_toml(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse a configuration document.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The mediation parameters this configuration implies.
    pub fn mediation(&self) -> MediationConfig {
        MediationConfig {
            reminder_interval: Duration::from_millis(self.ptpm_connect_request_interval_ms),
            capture_timeout: Duration::from_millis(self.ptpm_server_connect_timeout_ms),
            connect_timeout: Duration::from_millis(self.ptpm_connect_timeout_ms),
            udp_port: self.udp_port,
        }
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("ORION_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from("orion.toml")
    }
}

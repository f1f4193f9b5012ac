//! Configuration file for the netcp CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use netcp_core::{Endpoint, EnvConfig, TransferConfig};

/// netcp configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Transfer configuration
    #[serde(default)]
    pub transfer: TransferSection,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration
///
/// Used only where neither a flag nor `NETCP_IP` / `NETCP_PORT` is set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    /// IPv4 address (optionally `ip:port`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// UDP port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSection {
    /// Chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Receive buffer size in bytes
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
    /// Pause between data datagrams, in milliseconds
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    /// Receive timeout between shutdown checks, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Kernel socket buffer size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_buffer_size: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_chunk_size() -> usize {
    TransferConfig::default().chunk_size
}

fn default_recv_buffer_size() -> usize {
    TransferConfig::default().recv_buffer_size
}

fn default_send_interval_ms() -> u64 {
    TransferConfig::default().send_interval.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    TransferConfig::default().poll_interval.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            recv_buffer_size: default_recv_buffer_size(),
            send_interval_ms: default_send_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            socket_buffer_size: None,
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

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("netcp/config.toml")
    }

    /// Load config from the default path, or defaults if there is no file
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Engine settings
    #[must_use]
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            chunk_size: self.transfer.chunk_size,
            recv_buffer_size: self.transfer.recv_buffer_size,
            send_interval: Duration::from_millis(self.transfer.send_interval_ms),
            poll_interval: Duration::from_millis(self.transfer.poll_interval_ms),
            socket_buffer_size: self.transfer.socket_buffer_size,
        }
    }

    /// Environment values with this file's `[network]` section underneath
    #[must_use]
    pub fn layered_env(&self, env: &EnvConfig) -> EnvConfig {
        EnvConfig {
            ip: env.ip.clone().or_else(|| self.network.ip.clone()),
            port: env
                .port
                .clone()
                .or_else(|| self.network.port.map(|p| p.to_string())),
        }
    }

    /// Send destination: `flag`, then environment, then file, then defaults
    ///
    /// # Errors
    ///
    /// Returns an error if no port is configured anywhere or a value is malformed.
    pub fn destination(&self, flag: Option<&str>, env: &EnvConfig) -> anyhow::Result<Endpoint> {
        Ok(Self::override_ip(self.layered_env(env), flag).destination()?)
    }

    /// Receive bind endpoint: `flag`, then environment, then file, then defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a value is malformed.
    pub fn bind_endpoint(&self, flag: Option<&str>, env: &EnvConfig) -> anyhow::Result<Endpoint> {
        Ok(Self::override_ip(self.layered_env(env), flag).bind_endpoint()?)
    }

    fn override_ip(mut layered: EnvConfig, flag: Option<&str>) -> EnvConfig {
        if let Some(flag) = flag {
            layered.ip = Some(flag.to_string());
        }
        layered
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.transfer_config().validate()?;

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        if let Some(ip) = &self.network.ip {
            ip.parse::<Endpoint>()?;
        }

        Ok(())
    }
}

//! Transfer settings and environment-driven endpoint selection.

use std::time::Duration;

use netcp_files::DEFAULT_CHUNK_SIZE;
use netcp_transport::endpoint::{parse_port, resolve};
use netcp_transport::{Endpoint, MAX_DATAGRAM_PAYLOAD, TransportConfig};

use crate::error::{Error, Result};
use crate::{DEFAULT_RECEIVE_PORT, ENV_IP, ENV_PORT};

/// Tunables shared by the send and receive loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Bytes read from the source per datagram
    pub chunk_size: usize,
    /// Capacity of the receive buffer; larger datagrams are truncated
    pub recv_buffer_size: usize,
    /// Pause after each data datagram (zero disables pacing)
    pub send_interval: Duration,
    /// Receive timeout between shutdown checks
    pub poll_interval: Duration,
    /// Kernel socket buffer size (`None` keeps the OS default)
    pub socket_buffer_size: Option<usize>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            recv_buffer_size: MAX_DATAGRAM_PAYLOAD,
            send_interval: Duration::from_millis(1),
            poll_interval: Duration::from_millis(200),
            socket_buffer_size: None,
        }
    }
}

impl TransferConfig {
    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the chunk size does not fit in one
    /// datagram, the receive buffer cannot hold a full chunk, or the poll
    /// interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_DATAGRAM_PAYLOAD {
            return Err(Error::InvalidConfig(format!(
                "chunk size must be between 1 and {MAX_DATAGRAM_PAYLOAD} bytes, got {}",
                self.chunk_size
            )));
        }

        if self.recv_buffer_size < self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "receive buffer ({}) is smaller than the chunk size ({})",
                self.recv_buffer_size, self.chunk_size
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Socket settings derived from this configuration
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            recv_capacity: self.recv_buffer_size,
            recv_buffer_size: self.socket_buffer_size,
            send_buffer_size: self.socket_buffer_size,
        }
    }
}

/// `NETCP_IP` / `NETCP_PORT` as read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Raw `NETCP_IP` value
    pub ip: Option<String>,
    /// Raw `NETCP_PORT` value
    pub port: Option<String>,
}

impl EnvConfig {
    /// Read the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read values through `lookup` instead of the process environment
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            ip: non_empty(ENV_IP),
            port: non_empty(ENV_PORT),
        }
    }

    /// Destination for sending.
    ///
    /// The address defaults to loopback; a port is required, either from
    /// `NETCP_PORT` or an `ip:port` value in `NETCP_IP`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPort`] when no port is configured and
    /// [`Error::Address`] for malformed values.
    pub fn destination(&self) -> Result<Endpoint> {
        let ip = self.ip.as_deref().unwrap_or("127.0.0.1");
        match &self.port {
            Some(port) => Ok(resolve(Some(ip), parse_port(port.trim())?)?),
            None if ip.contains(':') => Ok(resolve(Some(ip), 0)?),
            None => Err(Error::MissingPort),
        }
    }

    /// Local endpoint for receiving (defaults to `127.0.0.1:8080`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Address`] for malformed values.
    pub fn bind_endpoint(&self) -> Result<Endpoint> {
        let port = match &self.port {
            Some(port) => parse_port(port.trim())?,
            None => DEFAULT_RECEIVE_PORT,
        };
        let ip = self.ip.as_deref().unwrap_or("127.0.0.1");
        Ok(resolve(Some(ip), port)?)
    }
}

//! # netcp Transport
//!
//! Datagram transport layer for netcp.
//!
//! This crate provides:
//! - IPv4 endpoint parsing (`host[:port]`) with strict validation
//! - An owned UDP socket that is created unbound and bound on demand
//! - Transport error types carrying the underlying OS error

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod endpoint;
pub mod error;
pub mod udp;

pub use endpoint::{AddressError, Endpoint, resolve};
pub use error::{TransportError, TransportResult};
pub use udp::UdpTransport;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Capacity of the buffer datagrams are received into
    pub recv_capacity: usize,
    /// Requested kernel receive buffer size (`None` keeps the OS default)
    pub recv_buffer_size: Option<usize>,
    /// Requested kernel send buffer size (`None` keeps the OS default)
    pub send_buffer_size: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            recv_capacity: MAX_DATAGRAM_PAYLOAD,
            recv_buffer_size: None,
            send_buffer_size: None,
        }
    }
}

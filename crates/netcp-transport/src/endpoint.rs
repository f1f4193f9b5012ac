//! IPv4 endpoint parsing.
//!
//! Endpoints are written as `a.b.c.d` or `a.b.c.d:port`. Only strict
//! dotted-quad addresses are accepted; host names are never resolved.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use thiserror::Error;

/// Address parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Host part is not a dotted-quad IPv4 address
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),

    /// Port part is not a decimal integer in `0..=65535`
    #[error("invalid port: {0:?}")]
    InvalidPort(String),
}

/// An IPv4 address plus UDP port identifying one side of a datagram exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: Ipv4Addr,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from its parts
    #[must_use]
    pub const fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }

    /// Wildcard address (`0.0.0.0`) with the given port
    #[must_use]
    pub const fn any(port: u16) -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, port)
    }

    /// Loopback address (`127.0.0.1`) with the given port
    #[must_use]
    pub const fn loopback(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port)
    }

    /// IPv4 address
    #[must_use]
    pub const fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// UDP port (0 means ephemeral)
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Copy of this endpoint with a different port
    #[must_use]
    pub const fn with_port(self, port: u16) -> Self {
        Self::new(self.addr, port)
    }

    /// Whether the address is the wildcard `0.0.0.0`
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.addr.is_unspecified()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(endpoint: Endpoint) -> Self {
        SocketAddrV4::new(endpoint.addr, endpoint.port)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        SocketAddr::V4(endpoint.into())
    }
}

impl TryFrom<SocketAddr> for Endpoint {
    type Error = AddressError;

    fn try_from(addr: SocketAddr) -> Result<Self, Self::Error> {
        match addr {
            SocketAddr::V4(v4) => Ok(v4.into()),
            SocketAddr::V6(v6) => Err(AddressError::InvalidAddress(v6.ip().to_string())),
        }
    }
}

impl FromStr for Endpoint {
    type Err = AddressError;

    /// Parse `a.b.c.d[:port]`; a missing port means port 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(Some(s), 0)
    }
}

/// Resolve an optional `host[:port]` spec into an [`Endpoint`].
///
/// - `None` yields the wildcard address with `default_port`.
/// - A `:port` suffix overrides `default_port`.
///
/// # Errors
///
/// Returns [`AddressError::InvalidAddress`] if the host is not a dotted-quad
/// IPv4 address and [`AddressError::InvalidPort`] if the port is not a
/// decimal integer in `0..=65535`.
///
/// # Examples
///
/// ```
/// use netcp_transport::endpoint::{Endpoint, resolve};
///
/// let ep = resolve(Some("127.0.0.1:9000"), 0).unwrap();
/// assert_eq!(ep, Endpoint::loopback(9000));
///
/// let ep = resolve(None, 5000).unwrap();
/// assert_eq!(ep, Endpoint::any(5000));
/// ```
pub fn resolve(spec: Option<&str>, default_port: u16) -> Result<Endpoint, AddressError> {
    let Some(spec) = spec else {
        return Ok(Endpoint::any(default_port));
    };

    let (host, port) = match spec.rsplit_once(':') {
        Some((host, port)) => (host, parse_port(port)?),
        None => (spec, default_port),
    };

    let addr = host
        .parse::<Ipv4Addr>()
        .map_err(|_| AddressError::InvalidAddress(host.to_string()))?;

    Ok(Endpoint::new(addr, port))
}

/// Parse a decimal port number.
///
/// # Errors
///
/// Returns [`AddressError::InvalidPort`] for anything outside `0..=65535`.
pub fn parse_port(port: &str) -> Result<u16, AddressError> {
    // u16::from_str accepts a leading '+', which is not a port.
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::InvalidPort(port.to_string()));
    }
    port.parse::<u16>()
        .map_err(|_| AddressError::InvalidPort(port.to_string()))
}

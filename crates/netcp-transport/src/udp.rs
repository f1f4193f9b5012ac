//! Owned UDP datagram socket.
//!
//! The socket is created unbound. Receivers bind it to a local endpoint
//! before the first receive; senders normally leave it unbound and let the
//! OS assign an ephemeral port on the first send.
//!
//! Every operation is blocking. A read timeout can be configured so a
//! receiver wakes up periodically (e.g. to check for shutdown).

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::UdpSocket;
use std::time::Duration;

use crate::TransportConfig;
use crate::endpoint::Endpoint;
use crate::error::{TransportError, TransportResult};

/// Owned IPv4 UDP socket with a reusable receive buffer.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    recv_buf: Vec<u8>,
    bound: bool,
}

impl UdpTransport {
    /// Create an unbound UDP socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CreateFailed`] if the OS refuses to allocate
    /// the socket or to apply the requested buffer sizes.
    pub fn create(config: &TransportConfig) -> TransportResult<Self> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(TransportError::CreateFailed)?;

        if let Some(size) = config.recv_buffer_size {
            socket2
                .set_recv_buffer_size(size)
                .map_err(TransportError::CreateFailed)?;
        }
        if let Some(size) = config.send_buffer_size {
            socket2
                .set_send_buffer_size(size)
                .map_err(TransportError::CreateFailed)?;
        }

        tracing::trace!(recv_capacity = config.recv_capacity, "udp socket created");

        Ok(Self {
            socket: Some(socket2.into()),
            recv_buf: vec![0u8; config.recv_capacity],
            bound: false,
        })
    }

    /// Create a socket and bind it to `endpoint`.
    ///
    /// # Examples
    /// ```no_run
    /// use netcp_transport::{Endpoint, TransportConfig, UdpTransport};
    ///
    /// let transport = UdpTransport::bind_to(Endpoint::loopback(0), &TransportConfig::default()).unwrap();
    /// println!("Listening on {}", transport.local_endpoint().unwrap());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CreateFailed`] or [`TransportError::BindFailed`].
    pub fn bind_to(endpoint: Endpoint, config: &TransportConfig) -> TransportResult<Self> {
        let mut transport = Self::create(config)?;
        transport.bind(endpoint)?;
        Ok(transport)
    }

    /// Bind the socket to a local endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] with the OS error, or
    /// [`TransportError::Closed`] after [`close`](Self::close).
    pub fn bind(&mut self, endpoint: Endpoint) -> TransportResult<()> {
        let socket = self.socket.take().ok_or(TransportError::Closed)?;

        // std's UdpSocket cannot bind after creation; go through socket2.
        let socket2 = Socket::from(socket);
        let result = socket2.bind(&SockAddr::from(std::net::SocketAddr::from(endpoint)));
        self.socket = Some(socket2.into());

        result.map_err(|source| TransportError::BindFailed { endpoint, source })?;
        self.bound = true;

        tracing::debug!(%endpoint, local = ?self.local_endpoint().ok(), "udp socket bound");
        Ok(())
    }

    /// Send one datagram to `destination`.
    ///
    /// Returns the number of bytes sent. An empty `buf` sends an empty
    /// datagram.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] with the OS error, or
    /// [`TransportError::ShortSend`] if the OS accepted only part of the
    /// datagram.
    pub fn send_to(&self, buf: &[u8], destination: Endpoint) -> TransportResult<usize> {
        let socket = self.socket()?;
        let sent = socket.send_to(buf, std::net::SocketAddr::from(destination))?;
        if sent != buf.len() {
            return Err(TransportError::ShortSend {
                sent,
                expected: buf.len(),
            });
        }
        Ok(sent)
    }

    /// Receive one datagram.
    ///
    /// Returns the payload (a view into the internal receive buffer) and the
    /// sender's endpoint. Payloads larger than the receive capacity are
    /// truncated by the OS.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::TimedOut`] if a read timeout is set and
    /// expires (an interrupted call is reported the same way so callers
    /// re-check their state), [`TransportError::Io`] for OS errors.
    pub fn recv_from(&mut self) -> TransportResult<(&[u8], Endpoint)> {
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
        let (len, from) = match socket.recv_from(&mut self.recv_buf) {
            Ok(received) => received,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                return Err(TransportError::TimedOut);
            }
            Err(e) => return Err(e.into()),
        };

        let from = Endpoint::try_from(from)
            .map_err(|_| TransportError::UnsupportedPeer(from.to_string()))?;
        Ok((&self.recv_buf[..len], from))
    }

    /// Set (or clear) the receive timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or the OS rejects the value.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> TransportResult<()> {
        self.socket()?.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Local endpoint (`0.0.0.0:0` until bound or first send)
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed.
    pub fn local_endpoint(&self) -> TransportResult<Endpoint> {
        let addr = self.socket()?.local_addr()?;
        Endpoint::try_from(addr).map_err(|_| TransportError::UnsupportedPeer(addr.to_string()))
    }

    /// Whether [`bind`](Self::bind) has succeeded on this socket
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Capacity of the receive buffer in bytes
    #[must_use]
    pub fn recv_capacity(&self) -> usize {
        self.recv_buf.len()
    }

    /// Close the socket. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::trace!("udp socket closed");
        }
    }

    /// Whether the socket has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn socket(&self) -> TransportResult<&UdpSocket> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local", &self.local_endpoint().ok())
            .field("bound", &self.bound)
            .field("recv_capacity", &self.recv_buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound_loopback() -> UdpTransport {
        let transport = UdpTransport::bind_to(Endpoint::loopback(0), &TransportConfig::default())
            .unwrap();
        transport
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        transport
    }

    #[test]
    fn test_udp_bind_ephemeral() {
        let transport = bound_loopback();
        let local = transport.local_endpoint().unwrap();
        assert_ne!(local.port(), 0);
        assert_eq!(local.addr(), std::net::Ipv4Addr::LOCALHOST);
        assert!(transport.is_bound());
    }

    #[test]
    fn test_udp_create_is_unbound() {
        let transport = UdpTransport::create(&TransportConfig::default()).unwrap();
        assert!(!transport.is_bound());
        assert_eq!(transport.recv_capacity(), crate::MAX_DATAGRAM_PAYLOAD);
    }

    #[test]
    fn test_udp_send_recv() {
        let mut server = bound_loopback();
        let server_addr = server.local_endpoint().unwrap();

        let client = bound_loopback();
        let sent = client.send_to(b"Hello, netcp!", server_addr).unwrap();
        assert_eq!(sent, 13);

        let client_addr = client.local_endpoint().unwrap();
        let (payload, from) = server.recv_from().unwrap();
        assert_eq!(payload, b"Hello, netcp!");
        assert_eq!(from, client_addr);
    }

    #[test]
    fn test_udp_unbound_sender_gets_ephemeral_port() {
        let mut server = bound_loopback();
        let server_addr = server.local_endpoint().unwrap();

        let client = UdpTransport::create(&TransportConfig::default()).unwrap();
        client.send_to(b"ping", server_addr).unwrap();

        let (payload, from) = server.recv_from().unwrap();
        assert_eq!(payload, b"ping");
        assert_ne!(from.port(), 0);
        assert_eq!(client.local_endpoint().unwrap().port(), from.port());
    }

    #[test]
    fn test_udp_empty_packet() {
        let mut server = bound_loopback();
        let server_addr = server.local_endpoint().unwrap();

        let client = bound_loopback();
        assert_eq!(client.send_to(&[], server_addr).unwrap(), 0);

        let (payload, _) = server.recv_from().unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_udp_small_recv_capacity_truncates() {
        let config = TransportConfig {
            recv_capacity: 4,
            ..TransportConfig::default()
        };
        let mut server = UdpTransport::bind_to(Endpoint::loopback(0), &config).unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let server_addr = server.local_endpoint().unwrap();

        let client = bound_loopback();
        client.send_to(b"abcdefgh", server_addr).unwrap();

        let (payload, _) = server.recv_from().unwrap();
        assert_eq!(payload, b"abcd");
    }

    #[test]
    fn test_udp_read_timeout() {
        let mut transport = bound_loopback();
        transport
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let err = transport.recv_from().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_udp_close_is_idempotent() {
        let mut transport = bound_loopback();
        transport.close();
        transport.close();
        assert!(transport.is_closed());

        assert!(matches!(
            transport.send_to(b"x", Endpoint::loopback(9)),
            Err(TransportError::Closed)
        ));
        assert!(matches!(transport.recv_from(), Err(TransportError::Closed)));
        assert!(matches!(
            transport.bind(Endpoint::loopback(0)),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_udp_bind_conflict_reports_os_error() {
        let first = bound_loopback();
        let taken = first.local_endpoint().unwrap();

        let err = UdpTransport::bind_to(taken, &TransportConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::BindFailed { endpoint, .. } if endpoint == taken));
        assert!(err.os_code().is_some());
    }

    #[test]
    fn test_udp_multiple_packets_in_order_on_loopback() {
        let mut server = bound_loopback();
        let server_addr = server.local_endpoint().unwrap();
        let client = bound_loopback();

        for i in 0..10 {
            client
                .send_to(format!("Packet {i}").as_bytes(), server_addr)
                .unwrap();
        }

        for i in 0..10 {
            let (payload, _) = server.recv_from().unwrap();
            assert_eq!(payload, format!("Packet {i}").as_bytes());
        }
    }
}

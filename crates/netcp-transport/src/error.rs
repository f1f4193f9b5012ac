//! Transport error types.

use std::io;

use crate::endpoint::Endpoint;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error from the underlying socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Socket has been closed
    #[error("socket is closed")]
    Closed,

    /// Socket could not be created
    #[error("failed to create UDP socket: {0}")]
    CreateFailed(#[source] io::Error),

    /// Address binding failed
    #[error("failed to bind to {endpoint}: {source}")]
    BindFailed {
        /// Endpoint the bind was attempted on
        endpoint: Endpoint,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// The OS accepted fewer bytes than the datagram held
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend {
        /// Bytes accepted by the OS
        sent: usize,
        /// Bytes in the datagram
        expected: usize,
    },

    /// No datagram arrived before the read timeout
    #[error("receive timed out")]
    TimedOut,

    /// Datagram came from a non-IPv4 peer
    #[error("unsupported peer address: {0}")]
    UnsupportedPeer(String),
}

impl TransportError {
    /// Raw OS error code, when the failure came from the OS
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Io(e) | Self::CreateFailed(e) | Self::BindFailed { source: e, .. } => {
                e.raw_os_error()
            }
            _ => None,
        }
    }

    /// Whether this is a read timeout rather than a real failure
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

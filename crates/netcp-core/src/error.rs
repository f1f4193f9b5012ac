//! Error types for the netcp transfer engine.

use std::io;
use std::path::PathBuf;

use netcp_files::FileError;
use netcp_transport::{AddressError, Endpoint, TransportError};
use thiserror::Error;

/// Transfer engine errors
///
/// Every variant that originates in the OS keeps the underlying error;
/// [`Error::os_code`] exposes the raw errno for diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    /// Source path does not exist
    #[error("source file not found: {}", path.display())]
    SourceNotFound {
        /// Path that was looked up
        path: PathBuf,
        /// OS error from the stat call
        #[source]
        source: io::Error,
    },

    /// Source or destination file could not be opened
    #[error("cannot open {}: {source}", path.display())]
    OpenFailed {
        /// Path that was opened
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: FileError,
    },

    /// Socket creation or binding failed
    #[error("socket setup failed: {0}")]
    SocketSetupFailed(#[source] TransportError),

    /// Address or port could not be parsed
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Sending requires a destination port and none was configured
    #[error("no destination port configured (set {})", crate::ENV_PORT)]
    MissingPort,

    /// Transfer settings are unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading the source file failed mid-transfer
    #[error("read failed: {0}")]
    ReadFailed(#[source] FileError),

    /// Sending a datagram failed
    #[error("send to {destination} failed: {source}")]
    SendFailed {
        /// Datagram destination
        destination: Endpoint,
        /// Underlying failure
        #[source]
        source: TransportError,
    },

    /// Receiving a datagram failed
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] TransportError),

    /// Writing the destination file failed
    #[error("write failed: {0}")]
    WriteFailed(#[source] FileError),
}

impl Error {
    /// Raw OS error code, when the failure came from the OS
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::SourceNotFound { source, .. } => source.raw_os_error(),
            Self::OpenFailed { source, .. } | Self::ReadFailed(source) | Self::WriteFailed(source) => {
                source.os_code()
            }
            Self::SocketSetupFailed(source)
            | Self::SendFailed { source, .. }
            | Self::ReceiveFailed(source) => source.os_code(),
            Self::Address(_) | Self::MissingPort | Self::InvalidConfig(_) => None,
        }
    }
}

/// Result type for transfer operations
pub type Result<T> = std::result::Result<T, Error>;

//! # netcp Core
//!
//! Transfer engine for netcp.
//!
//! This crate composes the endpoint resolver and UDP socket from
//! `netcp-transport` with the file channels from `netcp-files` into two
//! blocking operations:
//!
//! - [`send_file`]: read a file chunk by chunk, one datagram per chunk,
//!   followed by an empty datagram marking the end of the stream
//! - [`receive_file`]: write every datagram's payload to a file until the
//!   empty datagram arrives
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  chunks   ┌──────────────┐  datagrams  ┌──────────────┐
//! │  FileReader  │──────────▶│  FileSender  │────────────▶│ UdpTransport │
//! └──────────────┘           └──────┬───────┘             └──────────────┘
//!                                   │ polls
//!                            ┌──────▼────────┐
//!                            │ ShutdownToken │◀── SignalGuard (SIGINT/TERM/HUP/QUIT)
//!                            └──────▲────────┘
//!                                   │ polls
//! ┌──────────────┐  payloads ┌──────┴───────┐  datagrams  ┌──────────────┐
//! │  FileWriter  │◀──────────│ FileReceiver │◀────────────│ UdpTransport │
//! └──────────────┘           └──────────────┘             └──────────────┘
//! ```
//!
//! The wire format has no header, sequence number or checksum. Datagram
//! loss, duplication or reordering silently changes the received file.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod shutdown;
pub mod transfer;

pub use config::{EnvConfig, TransferConfig};
pub use error::{Error, Result};
pub use shutdown::{ShutdownToken, SignalGuard};
pub use transfer::{
    FileReceiver, FileSender, TransferOutcome, TransferReport, receive_file, send_file,
};

pub use netcp_transport::{AddressError, Endpoint};

/// Environment variable holding the UDP port
pub const ENV_PORT: &str = "NETCP_PORT";

/// Environment variable holding the IPv4 address (optionally `ip:port`)
pub const ENV_IP: &str = "NETCP_IP";

/// Port a receiver binds when `NETCP_PORT` is not set
pub const DEFAULT_RECEIVE_PORT: u16 = 8080;

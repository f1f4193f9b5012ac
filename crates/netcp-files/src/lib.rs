//! # netcp Files
//!
//! File side of a netcp transfer.
//!
//! This crate provides:
//! - A read-only source channel that yields bounded chunks
//! - A create/truncate destination channel that always writes whole chunks
//! - Chunk arithmetic for the sentinel-terminated wire format
//! - Transfer state machine types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod chunker;
pub mod transfer;

pub use channel::{FileError, FileReader, FileWriter};
pub use chunker::FileChunker;
pub use transfer::{TransferDirection, TransferState};

/// Default chunk size (4 KiB), one chunk per datagram
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Permission bits for files created by a receiver (`rw-r--r--`)
pub const DESTINATION_MODE: u32 = 0o644;

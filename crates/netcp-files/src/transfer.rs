//! Transfer state machine.
//!
//! ```text
//! send:    Idle -> FileOpened -> SocketReady -> Streaming -> Complete | Interrupted | Failed
//! receive: Idle -> SocketReady -> FileOpened -> Streaming -> Complete | Interrupted | Failed
//! ```

use std::fmt;

/// Transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    /// Nothing opened yet
    #[default]
    Idle,
    /// Source or destination file is open
    FileOpened,
    /// Socket created (and bound, when receiving)
    SocketReady,
    /// Chunks are moving
    Streaming,
    /// Terminal marker sent or received
    Complete,
    /// Stopped early on shutdown request
    Interrupted,
    /// Stopped on an error
    Failed,
}

impl TransferState {
    /// Whether the transfer has stopped
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Interrupted | Self::Failed)
    }

    /// Whether `next` is a legal successor for `direction`
    #[must_use]
    pub fn can_advance_to(self, next: Self, direction: TransferDirection) -> bool {
        use TransferState::*;
        match (self, next) {
            (from, Failed | Interrupted) => !from.is_terminal(),
            (Idle, FileOpened) => direction == TransferDirection::Send,
            (Idle, SocketReady) => direction == TransferDirection::Receive,
            (FileOpened, SocketReady) => direction == TransferDirection::Send,
            (SocketReady, FileOpened) => direction == TransferDirection::Receive,
            (FileOpened, Streaming) => direction == TransferDirection::Receive,
            (SocketReady, Streaming) => direction == TransferDirection::Send,
            (Streaming, Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FileOpened => "file-opened",
            Self::SocketReady => "socket-ready",
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Sending file
    Send,
    /// Receiving file
    Receive,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

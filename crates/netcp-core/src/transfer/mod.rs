//! File transfer over UDP.
//!
//! One datagram per chunk, then an empty datagram as end-of-stream marker.

mod receive;
mod send;

pub use receive::{FileReceiver, receive_file};
pub use send::{FileSender, send_file};

use std::fmt;
use std::time::{Duration, Instant};

use netcp_files::{TransferDirection, TransferState};
use netcp_transport::Endpoint;

/// Payload of the datagram that ends a transfer
pub const END_OF_STREAM: &[u8] = &[];

/// Progress callback, invoked with the running byte total
pub type ProgressFn = Box<dyn FnMut(u64) + Send>;

/// How a transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// End-of-stream marker sent or received
    Complete,
    /// Stopped early because shutdown was requested
    Interrupted,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Summary of a finished transfer
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Send or receive
    pub direction: TransferDirection,
    /// How the transfer ended
    pub outcome: TransferOutcome,
    /// Payload bytes sent or written
    pub bytes: u64,
    /// Data datagrams sent or received (the marker is not counted)
    pub chunks: u64,
    /// Destination when sending, first sender seen when receiving
    pub peer: Option<Endpoint>,
    /// Wall time from start to finish
    pub elapsed: Duration,
}

impl TransferReport {
    /// Whether the end-of-stream marker was exchanged
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome == TransferOutcome::Complete
    }

    /// Average throughput in bytes per second
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// State, counters and timing of one transfer in flight
struct Progress {
    direction: TransferDirection,
    state: TransferState,
    bytes: u64,
    chunks: u64,
    peer: Option<Endpoint>,
    started: Instant,
    callback: Option<ProgressFn>,
}

impl Progress {
    fn new(direction: TransferDirection, callback: Option<ProgressFn>) -> Self {
        Self {
            direction,
            state: TransferState::Idle,
            bytes: 0,
            chunks: 0,
            peer: None,
            started: Instant::now(),
            callback,
        }
    }

    fn advance(&mut self, next: TransferState) {
        debug_assert!(
            self.state.can_advance_to(next, self.direction),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(direction = %self.direction, from = %self.state, to = %next, "transfer state");
        self.state = next;
    }

    fn record(&mut self, len: usize) {
        self.bytes += len as u64;
        self.chunks += 1;
        if let Some(callback) = self.callback.as_mut() {
            callback(self.bytes);
        }
    }

    fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.advance(TransferState::Failed);
        }
    }

    fn finish(mut self, outcome: TransferOutcome) -> TransferReport {
        let terminal = match outcome {
            TransferOutcome::Complete => TransferState::Complete,
            TransferOutcome::Interrupted => TransferState::Interrupted,
        };
        self.advance(terminal);

        let report = TransferReport {
            direction: self.direction,
            outcome,
            bytes: self.bytes,
            chunks: self.chunks,
            peer: self.peer,
            elapsed: self.started.elapsed(),
        };
        tracing::info!(
            direction = %report.direction,
            outcome = %report.outcome,
            bytes = report.bytes,
            chunks = report.chunks,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "transfer finished"
        );
        report
    }
}

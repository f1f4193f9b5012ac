//! Child process error types.

use std::io;

use crate::subprocess::Stream;

/// Child process errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// No program was given
    #[error("empty command")]
    EmptyCommand,

    /// An argument contains an interior NUL byte
    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    /// The redirection pipe could not be created
    #[error("failed to allocate pipe: {0}")]
    PipeAllocationFailed(#[source] io::Error),

    /// `exec` was already called on this handle
    #[error("process already spawned")]
    AlreadySpawned,

    /// `fork` or `execvp` failed
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        /// argv\[0\]
        program: String,
        /// OS error (the child's errno for a failed exec)
        #[source]
        source: io::Error,
    },

    /// `waitpid` failed
    #[error("wait failed: {0}")]
    WaitFailed(#[source] io::Error),

    /// `killpg` failed
    #[error("kill failed: {0}")]
    KillFailed(#[source] io::Error),

    /// The stream is not the one selected at construction
    #[error("{0} is not redirected")]
    StreamNotRedirected(Stream),

    /// The stream's pipe end was already handed out
    #[error("{0} pipe was already taken")]
    StreamTaken(Stream),
}

impl ProcessError {
    /// Raw OS error code, when the failure came from the OS
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::PipeAllocationFailed(e)
            | Self::SpawnFailed { source: e, .. }
            | Self::WaitFailed(e)
            | Self::KillFailed(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Result type for child process operations
pub type ProcessResult<T> = Result<T, ProcessError>;

//! Cooperative shutdown.
//!
//! Termination signals never stop the process from inside a handler.
//! [`SignalGuard`] turns them into a [`ShutdownToken`] cancellation, and the
//! transfer loops poll the token between datagrams so they can close their
//! file and socket before returning.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    signal: AtomicI32,
}

/// Shared shutdown flag
///
/// Cloning is cheap; all clones observe the same request.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

impl ShutdownToken {
    /// Create a token with no shutdown requested
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
    }

    /// Request shutdown on behalf of `signo`. The first signal is kept.
    pub fn cancel_with_signal(&self, signo: i32) {
        let _ = self
            .inner
            .signal
            .compare_exchange(0, signo, Ordering::SeqCst, Ordering::SeqCst);
        self.cancel();
    }

    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Signal that requested shutdown, if any
    #[must_use]
    pub fn signal(&self) -> Option<i32> {
        match self.inner.signal.load(Ordering::SeqCst) {
            0 => None,
            signo => Some(signo),
        }
    }
}

/// Routes SIGINT, SIGTERM, SIGHUP and SIGQUIT to a [`ShutdownToken`]
///
/// Dropping the guard stops listening; the signal dispositions installed by
/// tokio stay in place for the rest of the process.
#[derive(Debug)]
pub struct SignalGuard {
    task: JoinHandle<()>,
}

impl SignalGuard {
    /// Register the handlers and start listening.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler cannot be registered.
    pub fn install(token: ShutdownToken) -> io::Result<Self> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;
        let mut quit = signal(SignalKind::quit())?;

        let task = tokio::spawn(async move {
            loop {
                let signo = tokio::select! {
                    Some(()) = interrupt.recv() => libc::SIGINT,
                    Some(()) = terminate.recv() => libc::SIGTERM,
                    Some(()) = hangup.recv() => libc::SIGHUP,
                    Some(()) = quit.recv() => libc::SIGQUIT,
                    else => break,
                };
                tracing::warn!("terminated (signal {}: {})", signo, signal_name(signo));
                token.cancel_with_signal(signo);
            }
        });

        tracing::debug!("signal handlers installed");
        Ok(Self { task })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Conventional name of a termination signal
#[must_use]
pub fn signal_name(signo: i32) -> &'static str {
    match signo {
        libc::SIGINT => "SIGINT",
        libc::SIGTERM => "SIGTERM",
        libc::SIGHUP => "SIGHUP",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGKILL => "SIGKILL",
        libc::SIGPIPE => "SIGPIPE",
        _ => "unknown",
    }
}

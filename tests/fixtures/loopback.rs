//! Sender/receiver pair over loopback
//!
//! Binds a receiver on an ephemeral loopback port, runs it on its own
//! thread, and sends a file to it.
//!
//! ```no_run
//! use netcp_integration_tests::fixtures::LoopbackTransfer;
//!
//! let fixture = LoopbackTransfer::new().unwrap();
//! let outcome = fixture.run(std::path::Path::new("/tmp/source.bin")).unwrap();
//! assert!(outcome.receive.is_complete());
//! ```

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use netcp_core::{
    Endpoint, FileReceiver, Result, ShutdownToken, TransferConfig, TransferReport, send_file,
};
use tempfile::TempDir;

/// Both sides' reports and the received file
pub struct LoopbackOutcome {
    /// Sender report
    pub send: TransferReport,
    /// Receiver report
    pub receive: TransferReport,
    /// Destination file
    pub destination: PathBuf,
}

/// Receiver bound on loopback, plus scratch space for the destination
pub struct LoopbackTransfer {
    dir: TempDir,
    config: TransferConfig,
}

impl LoopbackTransfer {
    /// Fixture with default transfer settings and a short poll interval
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        Self::with_config(TransferConfig {
            poll_interval: Duration::from_millis(20),
            ..TransferConfig::default()
        })
    }

    /// Fixture with custom transfer settings
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch directory cannot be created.
    pub fn with_config(config: TransferConfig) -> std::io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
            config,
        })
    }

    /// Scratch directory
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Start a receiver writing to `name` in the scratch directory
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn spawn_receiver(
        &self,
        name: &str,
        shutdown: &ShutdownToken,
    ) -> Result<(Endpoint, JoinHandle<Result<TransferReport>>)> {
        let receiver = FileReceiver::bind(Endpoint::loopback(0), self.config.clone())?;
        let endpoint = receiver.local_endpoint()?;
        let destination = self.dir.path().join(name);
        let token = shutdown.clone();
        let handle = thread::spawn(move || receiver.receive(&destination, &token));
        Ok((endpoint, handle))
    }

    /// Send `source` to a fresh receiver and wait for both sides
    ///
    /// # Errors
    ///
    /// Returns the first error from either side.
    ///
    /// # Panics
    ///
    /// Panics if the receiver thread panics.
    pub fn run(&self, source: &Path) -> Result<LoopbackOutcome> {
        let shutdown = ShutdownToken::new();
        let (endpoint, receiver) = self.spawn_receiver("received.bin", &shutdown)?;

        let send = send_file(source, endpoint, &self.config, &shutdown);
        if send.is_err() {
            shutdown.cancel();
        }
        let receive = receiver.join().expect("receiver thread panicked");

        Ok(LoopbackOutcome {
            send: send?,
            receive: receive?,
            destination: self.dir.path().join("received.bin"),
        })
    }
}

use std::path::Path;

use netcp_files::{FileWriter, TransferDirection, TransferState};
use netcp_transport::{Endpoint, UdpTransport};

use super::{Progress, ProgressFn, TransferOutcome, TransferReport};
use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::shutdown::ShutdownToken;

/// Bound socket waiting to write incoming datagrams to a file
///
/// Binding happens in [`FileReceiver::bind`], before the destination file is
/// touched, so the bound port can be handed to a sender first.
pub struct FileReceiver {
    transport: UdpTransport,
    config: TransferConfig,
    progress: Option<ProgressFn>,
}

impl FileReceiver {
    /// Bind a receiving socket at `endpoint` (port 0 picks an ephemeral one).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unusable settings and
    /// [`Error::SocketSetupFailed`] if the socket cannot be created or bound.
    pub fn bind(endpoint: Endpoint, config: TransferConfig) -> Result<Self> {
        config.validate()?;

        let transport = UdpTransport::bind_to(endpoint, &config.transport_config())
            .map_err(Error::SocketSetupFailed)?;
        transport
            .set_read_timeout(Some(config.poll_interval))
            .map_err(Error::SocketSetupFailed)?;

        Ok(Self {
            transport,
            config,
            progress: None,
        })
    }

    /// Endpoint the socket is bound to
    ///
    /// # Errors
    ///
    /// Returns [`Error::SocketSetupFailed`] if the address cannot be queried.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        self.transport
            .local_endpoint()
            .map_err(Error::SocketSetupFailed)
    }

    /// Report the running byte total after every datagram
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Create (or truncate) `path` and write each datagram's payload to it
    /// until the empty end-of-stream datagram arrives.
    ///
    /// Datagrams from any sender are accepted. Returns an `Interrupted`
    /// report if `shutdown` is cancelled first; bytes already written stay
    /// in the file.
    ///
    /// # Errors
    ///
    /// See [`receive_file`].
    pub fn receive(self, path: &Path, shutdown: &ShutdownToken) -> Result<TransferReport> {
        let Self {
            mut transport,
            progress,
            ..
        } = self;

        let mut progress = Progress::new(TransferDirection::Receive, progress);
        progress.advance(TransferState::SocketReady);

        let result = drain(&mut transport, path, shutdown, &mut progress);
        transport.close();

        match result {
            Ok(outcome) => Ok(progress.finish(outcome)),
            Err(e) => {
                progress.fail();
                tracing::error!(path = %path.display(), "receive failed: {}", e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for FileReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReceiver")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Bind at `bind` and receive into `path`.
///
/// # Errors
///
/// - [`Error::SocketSetupFailed`] if the socket cannot be created or bound
/// - [`Error::OpenFailed`] if `path` cannot be created
/// - [`Error::ReceiveFailed`] / [`Error::WriteFailed`] for mid-stream failures
pub fn receive_file(
    path: &Path,
    bind: Endpoint,
    config: &TransferConfig,
    shutdown: &ShutdownToken,
) -> Result<TransferReport> {
    FileReceiver::bind(bind, config.clone())?.receive(path, shutdown)
}

fn drain(
    transport: &mut UdpTransport,
    path: &Path,
    shutdown: &ShutdownToken,
    progress: &mut Progress,
) -> Result<TransferOutcome> {
    let mut writer = FileWriter::create(path).map_err(|source| Error::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    progress.advance(TransferState::FileOpened);

    if let Ok(local) = transport.local_endpoint() {
        tracing::info!(path = %path.display(), %local, "receiving");
    }
    progress.advance(TransferState::Streaming);

    let outcome = loop {
        if shutdown.is_cancelled() {
            tracing::warn!(written = progress.bytes, "receive interrupted");
            break TransferOutcome::Interrupted;
        }

        let (payload, from) = match transport.recv_from() {
            Ok(datagram) => datagram,
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(Error::ReceiveFailed(e)),
        };

        if progress.peer.is_none() {
            tracing::debug!(peer = %from, "first datagram");
            progress.peer = Some(from);
        }

        if payload.is_empty() {
            tracing::debug!(chunks = progress.chunks, "end-of-stream marker received");
            break TransferOutcome::Complete;
        }

        writer.write_all(payload).map_err(Error::WriteFailed)?;
        progress.record(payload.len());
        tracing::trace!(len = payload.len(), total = progress.bytes, "chunk written");
    };

    writer.close().map_err(Error::WriteFailed)?;
    Ok(outcome)
}

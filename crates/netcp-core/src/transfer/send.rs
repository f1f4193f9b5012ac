use std::io;
use std::path::Path;
use std::thread;

use netcp_files::{FileError, FileReader, TransferDirection, TransferState};
use netcp_transport::{Endpoint, UdpTransport};

use super::{END_OF_STREAM, Progress, ProgressFn, TransferOutcome, TransferReport};
use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::shutdown::ShutdownToken;

/// Streams a file to a destination endpoint
pub struct FileSender {
    destination: Endpoint,
    local: Option<Endpoint>,
    config: TransferConfig,
    progress: Option<ProgressFn>,
}

impl FileSender {
    /// Sender targeting `destination`
    #[must_use]
    pub fn new(destination: Endpoint, config: TransferConfig) -> Self {
        Self {
            destination,
            local: None,
            config,
            progress: None,
        }
    }

    /// Bind the sending socket to `local` instead of an ephemeral port
    #[must_use]
    pub fn with_local(mut self, local: Endpoint) -> Self {
        self.local = Some(local);
        self
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

    /// Destination endpoint
    #[must_use]
    pub fn destination(&self) -> Endpoint {
        self.destination
    }

    /// Send `path` chunk by chunk, then the end-of-stream marker.
    ///
    /// Returns an `Interrupted` report if `shutdown` is cancelled before the
    /// marker goes out; nothing further is sent in that case.
    ///
    /// # Errors
    ///
    /// See [`send_file`].
    pub fn send(self, path: &Path, shutdown: &ShutdownToken) -> Result<TransferReport> {
        self.config.validate()?;

        let mut progress = Progress::new(TransferDirection::Send, self.progress);
        progress.peer = Some(self.destination);

        let result = stream(
            path,
            self.destination,
            self.local,
            &self.config,
            shutdown,
            &mut progress,
        );
        match result {
            Ok(outcome) => Ok(progress.finish(outcome)),
            Err(e) => {
                progress.fail();
                tracing::error!(path = %path.display(), destination = %self.destination, "send failed: {}", e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for FileSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSender")
            .field("destination", &self.destination)
            .field("local", &self.local)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Send the file at `path` to `destination`.
///
/// # Errors
///
/// - [`Error::SourceNotFound`] if `path` does not exist
/// - [`Error::OpenFailed`] if it cannot be opened for reading
/// - [`Error::SocketSetupFailed`] if the socket cannot be created or bound
/// - [`Error::ReadFailed`] / [`Error::SendFailed`] for mid-stream failures
pub fn send_file(
    path: &Path,
    destination: Endpoint,
    config: &TransferConfig,
    shutdown: &ShutdownToken,
) -> Result<TransferReport> {
    FileSender::new(destination, config.clone()).send(path, shutdown)
}

fn stream(
    path: &Path,
    destination: Endpoint,
    local: Option<Endpoint>,
    config: &TransferConfig,
    shutdown: &ShutdownToken,
    progress: &mut Progress,
) -> Result<TransferOutcome> {
    let mut reader = open_source(path, config.chunk_size)?;
    progress.advance(TransferState::FileOpened);
    tracing::debug!(path = %path.display(), chunk_size = config.chunk_size, "source opened");

    let transport = match local {
        Some(local) => UdpTransport::bind_to(local, &config.transport_config()),
        None => UdpTransport::create(&config.transport_config()),
    }
    .map_err(Error::SocketSetupFailed)?;
    progress.advance(TransferState::SocketReady);

    tracing::info!(path = %path.display(), %destination, "sending");
    progress.advance(TransferState::Streaming);

    loop {
        if shutdown.is_cancelled() {
            tracing::warn!(sent = progress.bytes, "send interrupted");
            return Ok(TransferOutcome::Interrupted);
        }

        let chunk = reader.next_chunk().map_err(Error::ReadFailed)?;
        let send = |payload: &[u8]| {
            transport
                .send_to(payload, destination)
                .map_err(|source| Error::SendFailed {
                    destination,
                    source,
                })
        };

        if chunk.is_empty() {
            send(END_OF_STREAM)?;
            tracing::debug!(chunks = progress.chunks, "end-of-stream marker sent");
            return Ok(TransferOutcome::Complete);
        }

        let len = send(chunk)?;
        progress.record(len);
        tracing::trace!(len, total = progress.bytes, "chunk sent");

        if !config.send_interval.is_zero() {
            thread::sleep(config.send_interval);
        }
    }
}

fn open_source(path: &Path, chunk_size: usize) -> Result<FileReader> {
    let metadata = std::fs::metadata(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            Error::SourceNotFound {
                path: path.to_path_buf(),
                source,
            }
        } else {
            Error::OpenFailed {
                path: path.to_path_buf(),
                source: FileError::Io(source),
            }
        }
    })?;

    if metadata.is_dir() {
        return Err(Error::OpenFailed {
            path: path.to_path_buf(),
            source: FileError::Io(io::Error::from_raw_os_error(libc::EISDIR)),
        });
    }

    FileReader::open(path, chunk_size).map_err(|source| match source {
        FileError::NotFound { source, .. } => Error::SourceNotFound {
            path: path.to_path_buf(),
            source,
        },
        source => Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_config() -> TransferConfig {
        TransferConfig {
            send_interval: Duration::ZERO,
            ..TransferConfig::default()
        }
    }

    fn sink() -> UdpTransport {
        let sink = UdpTransport::bind_to(Endpoint::loopback(0), &Default::default()).unwrap();
        sink.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        sink
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = send_file(
            &dir.path().join("absent"),
            Endpoint::loopback(9),
            &fast_config(),
            &ShutdownToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
        assert_eq!(err.os_code(), Some(libc::ENOENT));
    }

    #[test]
    fn test_directory_source() {
        let dir = TempDir::new().unwrap();
        let err = send_file(
            dir.path(),
            Endpoint::loopback(9),
            &fast_config(),
            &ShutdownToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
        assert_eq!(err.os_code(), Some(libc::EISDIR));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src");
        std::fs::write(&path, b"x").unwrap();
        let config = TransferConfig {
            chunk_size: 0,
            ..fast_config()
        };
        let err = send_file(&path, Endpoint::loopback(9), &config, &ShutdownToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_send_failure_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src");
        std::fs::write(&path, b"x").unwrap();

        // broadcast without SO_BROADCAST
        let broadcast = Endpoint::new(std::net::Ipv4Addr::BROADCAST, 9);
        let err = send_file(&path, broadcast, &fast_config(), &ShutdownToken::new()).unwrap_err();
        assert!(matches!(err, Error::SendFailed { .. }));
        assert_eq!(err.os_code(), Some(libc::EACCES));
    }

    #[test]
    fn test_datagram_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src");
        std::fs::write(&path, vec![7u8; 10]).unwrap();

        let mut sink = sink();
        let dest = sink.local_endpoint().unwrap();
        let config = TransferConfig {
            chunk_size: 4,
            ..fast_config()
        };

        let report = send_file(&path, dest, &config, &ShutdownToken::new()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.bytes, 10);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.peer, Some(dest));

        let mut lens = Vec::new();
        for _ in 0..4 {
            let (payload, _) = sink.recv_from().unwrap();
            lens.push(payload.len());
        }
        assert_eq!(lens, vec![4, 4, 2, 0]);
    }

    #[test]
    fn test_empty_source_sends_only_marker() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let mut sink = sink();
        let dest = sink.local_endpoint().unwrap();
        let report = send_file(&path, dest, &fast_config(), &ShutdownToken::new()).unwrap();
        assert_eq!(report.chunks, 0);

        let (payload, _) = sink.recv_from().unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_cancelled_before_start_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src");
        std::fs::write(&path, vec![1u8; 100]).unwrap();

        let mut sink = sink();
        sink.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        let dest = sink.local_endpoint().unwrap();

        let token = ShutdownToken::new();
        token.cancel();
        let report = send_file(&path, dest, &fast_config(), &token).unwrap();
        assert_eq!(report.outcome, TransferOutcome::Interrupted);
        assert_eq!(report.bytes, 0);
        assert!(sink.recv_from().unwrap_err().is_timeout());
    }

    #[test]
    fn test_progress_callback_and_local_bind() {
        use std::sync::{Arc, Mutex};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src");
        std::fs::write(&path, vec![3u8; 9000]).unwrap();

        let mut sink = sink();
        let dest = sink.local_endpoint().unwrap();
        let totals = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&totals);

        let report = FileSender::new(dest, fast_config())
            .with_local(Endpoint::loopback(0))
            .with_progress(move |total| seen.lock().unwrap().push(total))
            .send(&path, &ShutdownToken::new())
            .unwrap();

        assert_eq!(report.bytes, 9000);
        assert_eq!(*totals.lock().unwrap(), vec![4096, 8192, 9000]);

        let (_, from) = sink.recv_from().unwrap();
        assert_eq!(from.addr(), std::net::Ipv4Addr::LOCALHOST);
    }
}

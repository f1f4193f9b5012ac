//! File channels for the two ends of a transfer.
//!
//! [`FileReader`] owns a source file opened read-only and hands out chunks
//! no larger than its chunk size. [`FileWriter`] owns a destination file
//! that is created (or truncated) with `rw-r--r--` permissions and only
//! ever reports success once a chunk has been written completely.
//!
//! Both close their descriptor on drop; `close()` may be called any number
//! of times.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::DESTINATION_MODE;

/// File channel errors
#[derive(Debug, Error)]
pub enum FileError {
    /// Path does not exist
    #[error("{}: no such file or directory", path.display())]
    NotFound {
        /// Offending path
        path: PathBuf,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// Caller lacks permission for the requested access
    #[error("{}: permission denied", path.display())]
    PermissionDenied {
        /// Offending path
        path: PathBuf,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Channel has been closed
    #[error("file channel is closed")]
    Closed,
}

impl FileError {
    fn from_open(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path, source },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::Io(source),
        }
    }

    /// Raw OS error code, when the failure came from the OS
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::NotFound { source, .. }
            | Self::PermissionDenied { source, .. }
            | Self::Io(source) => source.raw_os_error(),
            Self::Closed => None,
        }
    }
}

/// Read-only source file yielding bounded chunks
#[derive(Debug)]
pub struct FileReader {
    file: Option<File>,
    path: PathBuf,
    chunk: Vec<u8>,
}

impl FileReader {
    /// Open `path` read-only, reading at most `chunk_size` bytes per chunk.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::NotFound`], [`FileError::PermissionDenied`] or
    /// [`FileError::Io`] (`InvalidInput` for a zero `chunk_size`).
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self, FileError> {
        if chunk_size == 0 {
            return Err(FileError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk size must be non-zero",
            )));
        }
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FileError::from_open(path, e))?;

        tracing::debug!(path = %path.display(), chunk_size, "source file opened");

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            chunk: vec![0u8; chunk_size],
        })
    }

    /// Read the next chunk.
    ///
    /// A short chunk is normal; an empty chunk means end of file.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Io`] if the read fails or [`FileError::Closed`]
    /// after [`close`](Self::close).
    pub fn next_chunk(&mut self) -> Result<&[u8], FileError> {
        let file = self.file.as_mut().ok_or(FileError::Closed)?;
        let n = read_retrying(file, &mut self.chunk)?;
        Ok(&self.chunk[..n])
    }

    /// Read into a caller-supplied buffer, returning the byte count.
    ///
    /// # Errors
    ///
    /// Same as [`next_chunk`](Self::next_chunk).
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
        let file = self.file.as_mut().ok_or(FileError::Closed)?;
        Ok(read_retrying(file, buf)?)
    }

    /// File size in bytes at the time of the call
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read or the channel is closed.
    pub fn size(&self) -> Result<u64, FileError> {
        let file = self.file.as_ref().ok_or(FileError::Closed)?;
        Ok(file.metadata()?.len())
    }

    /// Maximum chunk size in bytes
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }

    /// Path this reader was opened on
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the file. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::trace!(path = %self.path.display(), "source file closed");
        }
    }

    /// Whether the file has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

fn read_retrying(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

/// Destination file, created or truncated on open
#[derive(Debug)]
pub struct FileWriter {
    file: Option<File>,
    path: PathBuf,
    written: u64,
}

impl FileWriter {
    /// Create `path` (or truncate it if it exists) with mode `rw-r--r--`.
    ///
    /// The mode applies only when the file is newly created and is still
    /// subject to the process umask.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::NotFound`] (missing parent directory),
    /// [`FileError::PermissionDenied`] or [`FileError::Io`].
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, FileError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(DESTINATION_MODE)
            .open(path)
            .map_err(|e| FileError::from_open(path, e))?;

        tracing::debug!(path = %path.display(), "destination file opened");

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Write the whole chunk.
    ///
    /// Partial and interrupted writes are retried until every byte has been
    /// written or the OS reports an error.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Io`] on failure (including a write that makes no
    /// progress) or [`FileError::Closed`] after [`close`](Self::close).
    pub fn write_all(&mut self, chunk: &[u8]) -> Result<(), FileError> {
        let file = self.file.as_mut().ok_or(FileError::Closed)?;
        file.write_all(chunk)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Total bytes written so far
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Path this writer was opened on
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file. Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the flush error, if any; the descriptor is closed either way.
    pub fn close(&mut self) -> Result<(), FileError> {
        match self.file.take() {
            Some(mut file) => {
                tracing::trace!(path = %self.path.display(), written = self.written, "destination file closed");
                file.flush()?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Whether the file has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

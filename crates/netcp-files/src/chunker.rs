//! Chunk arithmetic for the sentinel-terminated wire format.
//!
//! A file of `n` bytes travels as `ceil(n / chunk_size)` data datagrams
//! followed by exactly one empty datagram.

use crate::DEFAULT_CHUNK_SIZE;

/// Splits files into fixed-size chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChunker {
    chunk_size: usize,
}

impl FileChunker {
    /// Create a new chunker with default chunk size
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a new chunker with custom chunk size (a zero size counts as one)
    #[must_use]
    pub fn with_chunk_size(size: usize) -> Self {
        Self {
            chunk_size: size.max(1),
        }
    }

    /// Get chunk size
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of non-empty data chunks for a file
    #[must_use]
    pub fn chunk_count(&self, file_size: u64) -> u64 {
        file_size.div_ceil(self.chunk_size as u64)
    }

    /// Number of datagrams on the wire, including the terminal empty one
    #[must_use]
    pub fn datagram_count(&self, file_size: u64) -> u64 {
        self.chunk_count(file_size) + 1
    }

    /// Length of chunk `index` (zero-based) for a file of `file_size` bytes
    ///
    /// Returns `0` for the sentinel position and anything past it.
    #[must_use]
    pub fn chunk_len(&self, file_size: u64, index: u64) -> usize {
        let start = index.saturating_mul(self.chunk_size as u64);
        if start >= file_size {
            return 0;
        }
        (file_size - start).min(self.chunk_size as u64) as usize
    }
}

impl Default for FileChunker {
    fn default() -> Self {
        Self::new()
    }
}

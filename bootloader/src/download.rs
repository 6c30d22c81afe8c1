// Licensed under the Apache-2.0 license

//! Firmware source capability and the sink it pushes image bytes into.

use crate::storage::StorageError;

/// Receives consecutive chunks of a firmware image, starting at offset 0.
pub trait DownloadStreamSink {
    /// Consumes the next chunk. Returns the number of bytes stored, or the
    /// storage error; the downloader decides whether to carry on.
    fn handle_next_data_chunk(&mut self, data: &[u8]) -> Result<usize, StorageError>;
}

/// Fetches a firmware image from wherever it comes from (a bus, a file
/// transfer) and streams it into a sink.
///
/// Timeouts and retries of the transport belong to the implementation.
pub trait Downloader {
    fn download(&mut self, sink: &mut dyn DownloadStreamSink) -> Result<(), DownloadError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadError {
    /// The remote stopped responding.
    Timeout,
    /// The transfer was cancelled by either side.
    Aborted,
    /// The transport reported a protocol or link error.
    Transport,
    /// The sink rejected a chunk and the downloader gave up.
    Storage(StorageError),
}

impl From<StorageError> for DownloadError {
    fn from(err: StorageError) -> Self {
        DownloadError::Storage(err)
    }
}

impl core::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DownloadError::Timeout => f.write_str("download timed out"),
            DownloadError::Aborted => f.write_str("download aborted"),
            DownloadError::Transport => f.write_str("transport error"),
            DownloadError::Storage(err) => write!(f, "download stopped: {err}"),
        }
    }
}

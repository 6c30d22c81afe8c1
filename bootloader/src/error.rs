// Licensed under the Apache-2.0 license

use crate::download::DownloadError;
use crate::storage::StorageError;

/// Errors returned by [`crate::Bootloader::upgrade_app`].
///
/// Storage and download failures are passed through as reported by the
/// collaborator; `InvalidState` is the only error the bootloader raises itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootloaderError {
    /// The operation is not allowed in the current lifecycle state.
    InvalidState,
    Storage(StorageError),
    Download(DownloadError),
}

impl From<StorageError> for BootloaderError {
    fn from(err: StorageError) -> Self {
        BootloaderError::Storage(err)
    }
}

impl From<DownloadError> for BootloaderError {
    fn from(err: DownloadError) -> Self {
        BootloaderError::Download(err)
    }
}

impl core::fmt::Display for BootloaderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BootloaderError::InvalidState => f.write_str("invalid state for requested operation"),
            BootloaderError::Storage(err) => write!(f, "{err}"),
            BootloaderError::Download(err) => write!(f, "{err}"),
        }
    }
}

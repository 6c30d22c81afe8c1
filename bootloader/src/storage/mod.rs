// Licensed under the Apache-2.0 license

//! Storage capability the bootloader reads application images from and
//! writes upgrades into.

mod flash;
mod partition;

pub use flash::FlashStorage;
pub use partition::AppPartition;

/// Byte-addressable application storage with upgrade transaction hooks.
///
/// Implementations signal the end of the address space by returning fewer
/// bytes than requested; the bootloader has no other way to learn the
/// storage size.
pub trait AppStorageBackend {
    /// Reads into `buffer` starting at `offset`. Returns the number of bytes
    /// read, which is less than `buffer.len()` past the end of storage.
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<usize, StorageError>;

    /// Writes `buffer` at `offset`. Returns the number of bytes written.
    fn write(&mut self, offset: usize, buffer: &[u8]) -> Result<usize, StorageError>;

    /// Called once before the first write of an upgrade.
    fn begin_upgrade(&mut self) -> Result<(), StorageError>;

    /// Called once after the last write of an upgrade, with the outcome of
    /// the transfer.
    fn end_upgrade(&mut self, success: bool) -> Result<(), StorageError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum StorageError {
    /// Generic failure condition
    Fail = 1,
    /// Underlying system is busy; retry
    Busy = 2,
    /// The component is powered down
    Off = 4,
    /// An invalid parameter was passed
    Invalid = 6,
    /// Access outside of the storage bounds
    Size = 7,
    /// Operation is not supported
    NoSupport = 10,
    /// Device is not available
    NoDevice = 11,
}

impl From<StorageError> for usize {
    fn from(err: StorageError) -> usize {
        err as usize
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            StorageError::Fail => "storage failure",
            StorageError::Busy => "storage busy",
            StorageError::Off => "storage powered down",
            StorageError::Invalid => "invalid storage parameter",
            StorageError::Size => "access outside of storage",
            StorageError::NoSupport => "storage operation not supported",
            StorageError::NoDevice => "storage device not available",
        };
        f.write_str(text)
    }
}

// Licensed under the Apache-2.0 license

use super::StorageError;

/// Raw flash device under an [`super::AppPartition`]. Addresses are absolute
/// device offsets; the partition adds its base and enforces its bounds
/// before calling in.
pub trait FlashStorage {
    /// Fills `buffer` from `address`. The whole buffer is read or the call
    /// fails.
    fn read(&mut self, buffer: &mut [u8], address: usize) -> Result<(), StorageError>;

    /// Programs all of `buffer` at `address`. The target range has been
    /// erased by the partition when an upgrade began.
    fn write(&mut self, buffer: &[u8], address: usize) -> Result<(), StorageError>;

    /// Returns `length` bytes at `address` to the erased state.
    fn erase(&mut self, address: usize, length: usize) -> Result<(), StorageError>;

    /// Device size in bytes; partitions must fit inside it.
    fn capacity(&self) -> usize;
}

// Licensed under the Apache-2.0 license

use log::{debug, warn};

use super::{AppStorageBackend, FlashStorage, StorageError};

/// Application storage backed by a contiguous region of a flash device.
///
/// Reads are clamped to the partition, so scanning past its end yields short
/// reads. Starting an upgrade erases the whole region, and so does a failed
/// upgrade, which leaves no stale descriptor next to a half-written image.
pub struct AppPartition<F: FlashStorage> {
    driver: F,
    name: &'static str,
    base_offset: usize,
    length: usize,
}

impl<F: FlashStorage> AppPartition<F> {
    /// Creates a partition of `length` bytes starting at `base_offset`.
    ///
    /// Returns `Err(StorageError::Size)` if the partition exceeds the flash size.
    pub fn new(
        driver: F,
        name: &'static str,
        base_offset: usize,
        length: usize,
    ) -> Result<Self, StorageError> {
        let end = base_offset
            .checked_add(length)
            .ok_or(StorageError::Size)?;
        if end > driver.capacity() {
            return Err(StorageError::Size);
        }
        Ok(AppPartition {
            driver,
            name,
            base_offset,
            length,
        })
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn into_driver(self) -> F {
        self.driver
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        debug!("Erasing partition {} ({} bytes)", self.name, self.length);
        self.driver.erase(self.base_offset, self.length)
    }
}

impl<F: FlashStorage> AppStorageBackend for AppPartition<F> {
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<usize, StorageError> {
        if offset >= self.length {
            return Ok(0);
        }
        let count = buffer.len().min(self.length - offset);
        self.driver
            .read(&mut buffer[..count], self.base_offset + offset)?;
        Ok(count)
    }

    fn write(&mut self, offset: usize, buffer: &[u8]) -> Result<usize, StorageError> {
        match offset.checked_add(buffer.len()) {
            Some(end) if end <= self.length => {}
            _ => {
                warn!(
                    "Write of {} bytes at {:#x} exceeds partition {}",
                    buffer.len(),
                    offset,
                    self.name
                );
                return Err(StorageError::Size);
            }
        }
        self.driver.write(buffer, self.base_offset + offset)?;
        Ok(buffer.len())
    }

    fn begin_upgrade(&mut self) -> Result<(), StorageError> {
        self.erase_all()
    }

    fn end_upgrade(&mut self, success: bool) -> Result<(), StorageError> {
        if success {
            Ok(())
        } else {
            self.erase_all()
        }
    }
}

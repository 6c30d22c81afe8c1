// Licensed under the Apache-2.0 license

//! Search for a checksum-verified application descriptor in raw storage.

use app_descriptor::{
    is_image_crc_word, AppDescriptor, Crc64We, APP_DESCRIPTOR_SIGNATURE, APP_DESCRIPTOR_SIZE,
    DESCRIPTOR_SEARCH_STRIDE, IMAGE_WORD_SIZE,
};
use log::debug;
use zerocopy::FromBytes;

use crate::storage::{AppStorageBackend, StorageError};

/// Read access used by the locator. Every storage backend provides it; the
/// bootloader also wraps its backend in a reader that locks per access.
pub trait StorageRead {
    fn read_at(&mut self, offset: usize, buffer: &mut [u8]) -> Result<usize, StorageError>;
}

impl<B: AppStorageBackend + ?Sized> StorageRead for B {
    fn read_at(&mut self, offset: usize, buffer: &mut [u8]) -> Result<usize, StorageError> {
        self.read(offset, buffer)
    }
}

/// Returns true only if the whole buffer was filled.
fn read_exact<R: StorageRead + ?Sized>(storage: &mut R, offset: usize, buffer: &mut [u8]) -> bool {
    matches!(storage.read_at(offset, buffer), Ok(n) if n == buffer.len())
}

/// Scans storage for the first descriptor whose image checksum verifies.
///
/// Storage is checked every [`DESCRIPTOR_SEARCH_STRIDE`] bytes until a read
/// comes back short. Signature hits that are structurally invalid or whose
/// image does not match the stored checksum are skipped, and the scan goes on
/// from the next stride. Returns the descriptor offset and the descriptor.
pub fn locate_app_descriptor<R: StorageRead + ?Sized>(
    storage: &mut R,
) -> Option<(usize, AppDescriptor)> {
    let mut offset = 0;
    loop {
        let mut signature = [0u8; DESCRIPTOR_SEARCH_STRIDE];
        if !read_exact(storage, offset, &mut signature) {
            return None;
        }

        if signature == APP_DESCRIPTOR_SIGNATURE {
            if let Some(descriptor) = verify_candidate(storage, offset) {
                debug!("App descriptor located at offset {:#x}", offset);
                return Some((offset, descriptor));
            }
        }
        offset += DESCRIPTOR_SEARCH_STRIDE;
    }
}

fn verify_candidate<R: StorageRead + ?Sized>(
    storage: &mut R,
    offset: usize,
) -> Option<AppDescriptor> {
    let mut raw = [0u8; APP_DESCRIPTOR_SIZE];
    if !read_exact(storage, offset, &mut raw) {
        return None;
    }
    let descriptor = AppDescriptor::read_from_bytes(&raw).ok()?;
    if !descriptor.is_valid() {
        return None;
    }

    let crc = image_crc(storage, offset, descriptor.app_info.image_size.get() as usize);
    let stored = descriptor.app_info.image_crc.get();
    if crc != stored {
        debug!(
            "App descriptor found at {:#x}, but CRC is invalid ({:#018x} != {:#018x})",
            offset, crc, stored
        );
        return None;
    }
    Some(descriptor)
}

/// Folds the image into a checksum one word at a time, substituting zero for
/// the two words of the descriptor's own checksum field. Words that cannot be
/// read are left out rather than aborting the pass.
fn image_crc<R: StorageRead + ?Sized>(
    storage: &mut R,
    descriptor_offset: usize,
    image_size: usize,
) -> u64 {
    let mut crc = Crc64We::new();
    for index in 0..image_size / IMAGE_WORD_SIZE {
        let mut word = [0u8; IMAGE_WORD_SIZE];
        if !is_image_crc_word(index, descriptor_offset)
            && !read_exact(storage, index * IMAGE_WORD_SIZE, &mut word)
        {
            continue;
        }
        crc.add(&word);
    }
    crc.get()
}

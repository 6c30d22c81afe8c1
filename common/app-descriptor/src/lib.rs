// Licensed under the Apache-2.0 license
#![no_std]

//! Layout of the application descriptor embedded in firmware images, and the
//! checksum that certifies the image it lives in.
//!
//! The descriptor sits somewhere inside the image at an 8-byte aligned
//! offset. Its `image_crc` field covers the whole image, descriptor included,
//! with the eight bytes of `image_crc` itself folded in as zero.

use core::mem::offset_of;

use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

mod checksum;
pub use checksum::Crc64We;

pub const APP_DESCRIPTOR_SIGNATURE: [u8; 8] = *b"APDesc00";

/// Descriptors are searched for at multiples of the signature size.
pub const DESCRIPTOR_SEARCH_STRIDE: usize = APP_DESCRIPTOR_SIGNATURE.len();

/// The image checksum is computed over words of this size.
pub const IMAGE_WORD_SIZE: usize = 4;

pub const APP_DESCRIPTOR_SIZE: usize = core::mem::size_of::<AppDescriptor>();

/// Byte offset of `image_crc` from the start of the descriptor.
pub const IMAGE_CRC_OFFSET: usize =
    offset_of!(AppDescriptor, app_info) + offset_of!(AppInfo, image_crc);
pub const IMAGE_CRC_SIZE: usize = core::mem::size_of::<u64>();

#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct AppInfo {
    pub image_crc: U64,
    pub image_size: U32,
    pub vcs_commit: U32,
    pub major_version: u8,
    pub minor_version: u8,
}

impl AppInfo {
    /// Version metadata for an image whose size and checksum are not known yet.
    pub fn new(major_version: u8, minor_version: u8, vcs_commit: u32) -> Self {
        Self {
            image_crc: U64::new(0),
            image_size: U32::new(0),
            vcs_commit: U32::new(vcs_commit),
            major_version,
            minor_version,
        }
    }
}

#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct AppDescriptor {
    pub signature: [u8; 8],
    pub app_info: AppInfo,
    pub reserved: [u8; 6],
}

const _: () = assert!(APP_DESCRIPTOR_SIZE == 32);
const _: () = assert!(IMAGE_CRC_OFFSET == 8);

impl AppDescriptor {
    pub fn new(app_info: AppInfo) -> Self {
        Self {
            signature: APP_DESCRIPTOR_SIGNATURE,
            app_info,
            reserved: [0; 6],
        }
    }

    /// Structural sanity of the fields, independent of the image checksum.
    pub fn is_valid(&self) -> bool {
        if self.signature != APP_DESCRIPTOR_SIGNATURE {
            return false;
        }
        let image_size = self.app_info.image_size.get();
        image_size > 0 && image_size != u32::MAX
    }
}

/// Index of the first of the two image words that hold `image_crc` for a
/// descriptor located at `descriptor_offset`.
pub fn image_crc_word_index(descriptor_offset: usize) -> usize {
    (descriptor_offset + IMAGE_CRC_OFFSET) / IMAGE_WORD_SIZE
}

/// Returns true if image word `word_index` belongs to the `image_crc` field of
/// a descriptor at `descriptor_offset`.
pub fn is_image_crc_word(word_index: usize, descriptor_offset: usize) -> bool {
    let first = image_crc_word_index(descriptor_offset);
    word_index == first || word_index == first + 1
}

/// Finds the first descriptor signature in an image, scanning with the same
/// stride the bootloader uses.
pub fn find_descriptor(image: &[u8]) -> Option<usize> {
    (0..image.len())
        .step_by(DESCRIPTOR_SEARCH_STRIDE)
        .find(|&offset| {
            image
                .get(offset..offset + APP_DESCRIPTOR_SIGNATURE.len())
                .is_some_and(|s| s == APP_DESCRIPTOR_SIGNATURE)
        })
}

/// Computes the checksum of an in-memory image the way the bootloader
/// verifies it. Trailing bytes that do not fill a whole word are ignored.
pub fn compute_image_crc(image: &[u8], descriptor_offset: usize) -> u64 {
    let mut crc = Crc64We::new();
    for (index, word) in image.chunks_exact(IMAGE_WORD_SIZE).enumerate() {
        if is_image_crc_word(index, descriptor_offset) {
            crc.add(&[0; IMAGE_WORD_SIZE]);
        } else {
            crc.add(word);
        }
    }
    crc.get()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampError {
    /// The descriptor offset is not a multiple of the search stride.
    MisalignedDescriptor,
    /// The descriptor does not fit inside the image.
    Truncated,
    /// No signature at the descriptor offset.
    NoSignature,
    /// The image length is not a whole number of words.
    UnalignedLength,
    /// The image length does not fit the size field.
    TooLarge,
}

impl core::fmt::Display for StampError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StampError::MisalignedDescriptor => write!(
                f,
                "descriptor offset is not a multiple of {}",
                DESCRIPTOR_SEARCH_STRIDE
            ),
            StampError::Truncated => f.write_str("descriptor extends past the end of the image"),
            StampError::NoSignature => f.write_str("no descriptor signature at offset"),
            StampError::UnalignedLength => {
                write!(f, "image length is not a multiple of {}", IMAGE_WORD_SIZE)
            }
            StampError::TooLarge => f.write_str("image too large"),
        }
    }
}

/// Fills in `image_size` and `image_crc` of the descriptor at
/// `descriptor_offset`, in place. Returns the resulting app info.
pub fn stamp_image(image: &mut [u8], descriptor_offset: usize) -> Result<AppInfo, StampError> {
    if descriptor_offset % DESCRIPTOR_SEARCH_STRIDE != 0 {
        return Err(StampError::MisalignedDescriptor);
    }
    if image.len() % IMAGE_WORD_SIZE != 0 {
        return Err(StampError::UnalignedLength);
    }
    let image_size = u32::try_from(image.len())
        .ok()
        .filter(|&size| size != u32::MAX)
        .ok_or(StampError::TooLarge)?;
    let range = descriptor_offset..descriptor_offset + APP_DESCRIPTOR_SIZE;
    let raw = image.get(range.clone()).ok_or(StampError::Truncated)?;
    let mut descriptor =
        AppDescriptor::read_from_bytes(raw).map_err(|_| StampError::Truncated)?;
    if descriptor.signature != APP_DESCRIPTOR_SIGNATURE {
        return Err(StampError::NoSignature);
    }

    descriptor.app_info.image_size = U32::new(image_size);
    descriptor.app_info.image_crc = U64::new(0);
    image[range.clone()].copy_from_slice(descriptor.as_bytes());

    descriptor.app_info.image_crc = U64::new(compute_image_crc(image, descriptor_offset));
    image[range].copy_from_slice(descriptor.as_bytes());
    Ok(descriptor.app_info)
}

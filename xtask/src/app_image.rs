// Licensed under the Apache-2.0 license

use anyhow::{anyhow, bail, Result};
use app_descriptor::{find_descriptor, stamp_image, AppDescriptor, AppInfo, APP_DESCRIPTOR_SIZE};
use mcu_bootloader::clock::StdClock;
use mcu_bootloader::{AppStorageBackend, Bootloader, BootloaderConfig, State, StorageError};
use std::fs::File;
use std::io::{Read, Write};
use zerocopy::{FromBytes, IntoBytes};

/// Descriptor fields to overwrite before stamping. `None` keeps the value
/// the linker placed in the image.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct VersionOverride {
    pub major: Option<u8>,
    pub minor: Option<u8>,
    pub vcs_commit: Option<u32>,
}

/// Read-only storage over an image held in memory.
struct ImageBuffer {
    data: Vec<u8>,
}

impl AppStorageBackend for ImageBuffer {
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<usize, StorageError> {
        let tail = self.data.get(offset..).unwrap_or(&[]);
        let count = tail.len().min(buffer.len());
        buffer[..count].copy_from_slice(&tail[..count]);
        Ok(count)
    }

    fn write(&mut self, _offset: usize, _buffer: &[u8]) -> Result<usize, StorageError> {
        Err(StorageError::NoSupport)
    }

    fn begin_upgrade(&mut self) -> Result<(), StorageError> {
        Err(StorageError::NoSupport)
    }

    fn end_upgrade(&mut self, _success: bool) -> Result<(), StorageError> {
        Err(StorageError::NoSupport)
    }
}

fn load_file(filename: &str) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut file =
        File::open(filename).map_err(|e| anyhow!("Cannot open file '{}': {}", filename, e))?;
    file.read_to_end(&mut buffer)
        .map_err(|e| anyhow!("Cannot read file '{}': {}", filename, e))?;

    // The checksum covers whole words only.
    let padding = buffer.len().next_multiple_of(4) - buffer.len();
    buffer.extend(vec![0; padding]);
    Ok(buffer)
}

fn stamp(image: &mut [u8], versions: VersionOverride) -> Result<(usize, AppInfo)> {
    let offset =
        find_descriptor(image).ok_or_else(|| anyhow!("No application descriptor signature"))?;
    let range = offset..offset + APP_DESCRIPTOR_SIZE;
    let raw = image
        .get(range.clone())
        .ok_or_else(|| anyhow!("Descriptor at {:#x} is truncated", offset))?;
    let mut descriptor = AppDescriptor::read_from_bytes(raw)
        .map_err(|_| anyhow!("Failed to parse descriptor at {:#x}", offset))?;

    if let Some(major) = versions.major {
        descriptor.app_info.major_version = major;
    }
    if let Some(minor) = versions.minor {
        descriptor.app_info.minor_version = minor;
    }
    if let Some(vcs_commit) = versions.vcs_commit {
        descriptor.app_info.vcs_commit = vcs_commit.into();
    }
    image[range].copy_from_slice(descriptor.as_bytes());

    let info = stamp_image(image, offset)
        .map_err(|e| anyhow!("Cannot stamp descriptor at {:#x}: {}", offset, e))?;
    Ok((offset, info))
}

fn verify(data: Vec<u8>) -> Result<AppInfo> {
    let bootloader = Bootloader::new(
        ImageBuffer { data },
        StdClock::new(),
        BootloaderConfig::default(),
    );
    if bootloader.state() == State::NoAppToBoot {
        bail!("No valid application descriptor found");
    }
    bootloader
        .app_info()
        .ok_or_else(|| anyhow!("Application descriptor vanished on second scan"))
}

pub(crate) fn app_image_stamp(input: &str, output: &str, versions: VersionOverride) -> Result<()> {
    let mut image = load_file(input)?;
    let (offset, info) = stamp(&mut image, versions)?;

    let mut file =
        File::create(output).map_err(|e| anyhow!("Unable to create file {}: {}", output, e))?;
    file.write_all(&image)
        .map_err(|e| anyhow!("Unable to write file {}: {}", output, e))?;

    println!(
        "Stamped {}: descriptor at {:#x}, version {}.{}, commit {:#x}, {} bytes, crc {:#018x}",
        output,
        offset,
        info.major_version,
        info.minor_version,
        info.vcs_commit.get(),
        info.image_size.get(),
        info.image_crc.get()
    );
    Ok(())
}

pub(crate) fn app_image_verify(file: &str) -> Result<()> {
    let data = load_file(file)?;
    let info = verify(data).map_err(|e| anyhow!("{}: {}", file, e))?;
    println!(
        "{}: version {}.{}, commit {:#x}, {} bytes, crc {:#018x}",
        file,
        info.major_version,
        info.minor_version,
        info.vcs_commit.get(),
        info.image_size.get(),
        info.image_crc.get()
    );
    Ok(())
}

// Licensed under the Apache-2.0 license

//! Application integrity verification and upgrade orchestration for an MCU
//! bootloader.
//!
//! The [`Bootloader`] owns an [`AppStorageBackend`], locates a
//! checksum-verified application descriptor in it, runs the boot-delay
//! lifecycle, and drives firmware upgrades from a [`Downloader`].

#![cfg_attr(not(test), no_std)]

mod bootloader;
pub mod clock;
mod config;
mod download;
mod error;
mod lifecycle;
mod locator;
pub mod storage;

pub use app_descriptor::AppInfo;
pub use bootloader::Bootloader;
pub use clock::Clock;
pub use config::{BootloaderConfig, DEFAULT_BOOT_DELAY};
pub use download::{DownloadError, DownloadStreamSink, Downloader};
pub use error::BootloaderError;
pub use lifecycle::State;
pub use locator::{locate_app_descriptor, StorageRead};
pub use storage::{AppPartition, AppStorageBackend, FlashStorage, StorageError};

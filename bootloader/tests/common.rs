// Licensed under the Apache-2.0 license
#![allow(dead_code)]

use app_descriptor::{stamp_image, AppDescriptor, AppInfo, APP_DESCRIPTOR_SIZE};
use core::time::Duration;
use log::LevelFilter;
use mcu_bootloader::{
    AppStorageBackend, Bootloader, BootloaderConfig, Clock, DownloadError, DownloadStreamSink,
    Downloader, FlashStorage, StorageError,
};
use simple_logger::SimpleLogger;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use zerocopy::IntoBytes;

pub const ERASED: u8 = 0xFF;

pub fn init_logger() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    BeginUpgrade,
    EndUpgrade(bool),
}

struct RamState {
    data: Vec<u8>,
    ops: Vec<StorageOp>,
    writes: Vec<usize>,
    reads: usize,
    fail_begin: bool,
    fail_end: bool,
    fail_write_at: Option<usize>,
    unreadable: Option<Range<usize>>,
    short_read_at: Option<(usize, usize)>,
}

/// In-memory storage backend. Clones share the same memory, so a test can
/// keep a handle after moving one into the bootloader.
#[derive(Clone)]
pub struct RamStorage {
    state: Arc<Mutex<RamState>>,
}

impl RamStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(RamState {
                data: vec![ERASED; capacity],
                ops: Vec::new(),
                writes: Vec::new(),
                reads: 0,
                fail_begin: false,
                fail_end: false,
                fail_write_at: None,
                unreadable: None,
                short_read_at: None,
            })),
        }
    }

    pub fn with_image(image: &[u8], capacity: usize) -> Self {
        let storage = Self::new(capacity);
        storage.state.lock().unwrap().data[..image.len()].copy_from_slice(image);
        storage
    }

    pub fn contents(&self, range: Range<usize>) -> Vec<u8> {
        self.state.lock().unwrap().data[range].to_vec()
    }

    pub fn ops(&self) -> Vec<StorageOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn write_offsets(&self) -> Vec<usize> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn fail_begin(&self) {
        self.state.lock().unwrap().fail_begin = true;
    }

    pub fn fail_end(&self) {
        self.state.lock().unwrap().fail_end = true;
    }

    pub fn fail_write_at(&self, offset: usize) {
        self.state.lock().unwrap().fail_write_at = Some(offset);
    }

    pub fn make_unreadable(&self, range: Range<usize>) {
        self.state.lock().unwrap().unreadable = Some(range);
    }

    /// Reads starting at `offset` return at most `len` bytes.
    pub fn cut_reads_at(&self, offset: usize, len: usize) {
        self.state.lock().unwrap().short_read_at = Some((offset, len));
    }
}

impl AppStorageBackend for RamStorage {
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<usize, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if let Some(bad) = &state.unreadable {
            if offset < bad.end && offset + buffer.len() > bad.start {
                return Err(StorageError::Fail);
            }
        }
        let mut limit = buffer.len();
        if let Some((cut_offset, cut_len)) = state.short_read_at {
            if cut_offset == offset {
                limit = limit.min(cut_len);
            }
        }
        let tail = state.data.get(offset..).unwrap_or(&[]);
        let count = tail.len().min(limit);
        buffer[..count].copy_from_slice(&tail[..count]);
        Ok(count)
    }

    fn write(&mut self, offset: usize, buffer: &[u8]) -> Result<usize, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(offset);
        if state.fail_write_at == Some(offset) {
            return Err(StorageError::Fail);
        }
        let dst = state
            .data
            .get_mut(offset..offset + buffer.len())
            .ok_or(StorageError::Size)?;
        dst.copy_from_slice(buffer);
        Ok(buffer.len())
    }

    fn begin_upgrade(&mut self) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(StorageOp::BeginUpgrade);
        if state.fail_begin {
            return Err(StorageError::Busy);
        }
        state.data.fill(ERASED);
        Ok(())
    }

    fn end_upgrade(&mut self, success: bool) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(StorageOp::EndUpgrade(success));
        if state.fail_end {
            return Err(StorageError::Fail);
        }
        Ok(())
    }
}

/// Flash device model for driving an `AppPartition`.
pub struct RamFlash {
    data: Vec<u8>,
}

impl RamFlash {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![ERASED; capacity],
        }
    }

    pub fn program(&mut self, address: usize, bytes: &[u8]) {
        self.data[address..address + bytes.len()].copy_from_slice(bytes);
    }
}

impl FlashStorage for RamFlash {
    fn read(&mut self, buffer: &mut [u8], address: usize) -> Result<(), StorageError> {
        let src = self
            .data
            .get(address..address + buffer.len())
            .ok_or(StorageError::Size)?;
        buffer.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, buffer: &[u8], address: usize) -> Result<(), StorageError> {
        let dst = self
            .data
            .get_mut(address..address + buffer.len())
            .ok_or(StorageError::Size)?;
        dst.copy_from_slice(buffer);
        Ok(())
    }

    fn erase(&mut self, address: usize, length: usize) -> Result<(), StorageError> {
        self.data
            .get_mut(address..address + length)
            .ok_or(StorageError::Size)?
            .fill(ERASED);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Clock that only moves when told to.
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn starting_at(ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms.load(Ordering::SeqCst))
    }
}

/// Streams an image in fixed-size chunks, optionally failing part way.
pub struct ChunkedDownloader {
    image: Vec<u8>,
    chunk_size: usize,
    fail_after: Option<usize>,
    abort_on_storage_error: bool,
    pub results: Vec<Result<usize, StorageError>>,
}

impl ChunkedDownloader {
    pub fn new(image: &[u8], chunk_size: usize) -> Self {
        Self {
            image: image.to_vec(),
            chunk_size,
            fail_after: None,
            abort_on_storage_error: false,
            results: Vec::new(),
        }
    }

    /// The transfer breaks with a transport error once `bytes` were sent.
    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    pub fn aborting_on_storage_error(mut self) -> Self {
        self.abort_on_storage_error = true;
        self
    }
}

impl Downloader for ChunkedDownloader {
    fn download(&mut self, sink: &mut dyn DownloadStreamSink) -> Result<(), DownloadError> {
        let mut sent = 0;
        for chunk in self.image.chunks(self.chunk_size) {
            if self.fail_after.is_some_and(|limit| sent >= limit) {
                return Err(DownloadError::Transport);
            }
            let result = sink.handle_next_data_chunk(chunk);
            self.results.push(result);
            if let Err(err) = result {
                if self.abort_on_storage_error {
                    return Err(err.into());
                }
            }
            sent += chunk.len();
        }
        Ok(())
    }
}

/// Builds a stamped image of `len` bytes with a descriptor at `offset`.
pub fn build_image(len: usize, offset: usize, major: u8, minor: u8, commit: u32) -> Vec<u8> {
    let mut image: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
    place_descriptor(&mut image, offset, AppInfo::new(major, minor, commit));
    stamp_image(&mut image, offset).unwrap();
    image
}

pub fn place_descriptor(image: &mut [u8], offset: usize, info: AppInfo) {
    image[offset..offset + APP_DESCRIPTOR_SIZE]
        .copy_from_slice(AppDescriptor::new(info).as_bytes());
}

pub fn new_bootloader(
    storage: &RamStorage,
    clock: &ManualClock,
    boot_delay_ms: u64,
) -> Bootloader<RamStorage, ManualClock> {
    Bootloader::new(
        storage.clone(),
        clock.clone(),
        BootloaderConfig::with_boot_delay_ms(boot_delay_ms),
    )
}

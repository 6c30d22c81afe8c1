// Licensed under the Apache-2.0 license

use core::cell::RefCell;
use core::time::Duration;

use app_descriptor::AppInfo;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::BootloaderConfig;
use crate::download::{DownloadStreamSink, Downloader};
use crate::error::BootloaderError;
use crate::lifecycle::{Events, LifecycleContext, State, StateMachine};
use crate::locator::{locate_app_descriptor, StorageRead};
use crate::storage::{AppStorageBackend, StorageError};

struct Inner<B> {
    storage: B,
    lifecycle: StateMachine<LifecycleContext>,
}

type Shared<B> = Mutex<CriticalSectionRawMutex, RefCell<Inner<B>>>;

impl<B: AppStorageBackend> Inner<B> {
    fn state(&self) -> State {
        State::from(self.lifecycle.state())
    }

    /// Runs a full locate pass and moves from `NoAppToBoot` to `BootDelay`
    /// if a valid application is present.
    fn verify_app_and_update_state(&mut self, now: Duration) {
        let Some((offset, descriptor)) = locate_app_descriptor(&mut self.storage) else {
            info!("App not found");
            return;
        };
        let info = descriptor.app_info;
        info!(
            "App found at {:#x}; version {}.{}.{:x}, {} bytes",
            offset,
            info.major_version,
            info.minor_version,
            info.vcs_commit.get(),
            info.image_size.get()
        );
        if self.lifecycle.process_event(Events::AppFound(now)).is_err() {
            warn!("App found in unexpected state {:?}", self.state());
        }
    }
}

/// Bootloader core: owns the application storage and the boot lifecycle.
///
/// All methods take `&self` and may be called from several threads. The
/// lifecycle state and every storage access are serialized by one
/// critical-section mutex, which is never held while the downloader runs
/// between two chunks.
pub struct Bootloader<B: AppStorageBackend, C: Clock> {
    shared: Shared<B>,
    clock: C,
}

impl<B: AppStorageBackend, C: Clock> Bootloader<B, C> {
    /// Takes ownership of the storage and checks it for a valid application.
    /// The boot delay starts now if one is found.
    pub fn new(storage: B, clock: C, config: BootloaderConfig) -> Self {
        let context = LifecycleContext::new(config.boot_delay);
        debug!("Bootloader starting, boot delay {:?}", context.boot_delay());
        let mut inner = Inner {
            storage,
            lifecycle: StateMachine::new(context),
        };
        inner.verify_app_and_update_state(clock.now());
        Bootloader {
            shared: Mutex::new(RefCell::new(inner)),
            clock,
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<B>) -> R) -> R {
        self.shared.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    /// Current state. An expired boot delay turns into `ReadyToBoot` here.
    pub fn state(&self) -> State {
        let now = self.clock.now();
        self.with_inner(|inner| {
            if inner.state() == State::BootDelay
                && inner.lifecycle.process_event(Events::Poll(now)).is_ok()
            {
                info!("Boot delay expired");
            }
            inner.state()
        })
    }

    /// Stops an automatic boot. No effect unless in `BootDelay` or
    /// `ReadyToBoot`.
    pub fn cancel_boot(&self) {
        self.with_inner(|inner| {
            if inner.lifecycle.process_event(Events::CancelBoot).is_ok() {
                info!("Boot cancelled");
            }
        })
    }

    /// Boots without waiting for the delay. No effect unless in `BootDelay`
    /// or `BootCancelled`.
    pub fn request_boot(&self) {
        self.with_inner(|inner| {
            if inner.lifecycle.process_event(Events::RequestBoot).is_ok() {
                info!("Boot requested");
            }
        })
    }

    /// Locates the application again and returns its descriptor info.
    ///
    /// The lock is taken for each storage read only, so a long scan does not
    /// hold off other callers. The state is not changed.
    pub fn app_info(&self) -> Option<AppInfo> {
        let mut reader = LockedStorage {
            shared: &self.shared,
        };
        locate_app_descriptor(&mut reader).map(|(_, descriptor)| descriptor.app_info)
    }

    /// Replaces the application with the image delivered by `downloader`.
    ///
    /// Allowed from `NoAppToBoot`, `BootDelay` and `BootCancelled`; any other
    /// state yields [`BootloaderError::InvalidState`]. If the backend refuses
    /// to begin the upgrade its error is returned and the state is unchanged.
    ///
    /// A successful return only means the transfer and storage finalization
    /// worked. Whether the new image is bootable is reflected by the state
    /// afterwards: `BootDelay` if it verifies, `NoAppToBoot` otherwise.
    pub fn upgrade_app<D: Downloader + ?Sized>(
        &self,
        downloader: &mut D,
    ) -> Result<(), BootloaderError> {
        self.with_inner(|inner| {
            let state = inner.state();
            if !state.accepts_upgrade() {
                warn!("Upgrade rejected in state {:?}", state);
                return Err(BootloaderError::InvalidState);
            }
            inner.storage.begin_upgrade().map_err(|err| {
                error!("Could not begin upgrade: {}", err);
                BootloaderError::from(err)
            })?;
            if inner.lifecycle.process_event(Events::UpgradeStarted).is_err() {
                warn!("Upgrade started in unexpected state {:?}", inner.state());
            }
            info!("Starting app upgrade");
            Ok(())
        })?;

        let mut sink = UpgradeSink {
            shared: &self.shared,
            offset: 0,
        };
        let result = downloader.download(&mut sink);
        match result {
            Ok(()) => info!("Download complete, {} bytes", sink.offset),
            Err(err) => error!("Download failed after {} bytes: {}", sink.offset, err),
        }

        self.with_inner(|inner| {
            if inner.lifecycle.process_event(Events::UpgradeFinished).is_err() {
                warn!("Upgrade finished in unexpected state {:?}", inner.state());
            }

            if let Err(err) = result {
                if let Err(end_err) = inner.storage.end_upgrade(false) {
                    warn!("Could not roll back failed upgrade: {}", end_err);
                }
                return Err(BootloaderError::from(err));
            }

            inner.storage.end_upgrade(true).map_err(|err| {
                error!("Could not finalize upgrade: {}", err);
                BootloaderError::from(err)
            })?;

            inner.verify_app_and_update_state(self.clock.now());
            Ok(())
        })
    }
}

/// Storage reader that locks the bootloader for each read.
struct LockedStorage<'a, B> {
    shared: &'a Shared<B>,
}

impl<B: AppStorageBackend> StorageRead for LockedStorage<'_, B> {
    fn read_at(&mut self, offset: usize, buffer: &mut [u8]) -> Result<usize, StorageError> {
        self.shared
            .lock(|cell| cell.borrow_mut().storage.read(offset, buffer))
    }
}

/// Writes downloaded chunks consecutively, locking per chunk. The offset
/// moves past every chunk, written or not; the downloader sees the result
/// and decides whether to go on.
struct UpgradeSink<'a, B> {
    shared: &'a Shared<B>,
    offset: usize,
}

impl<B: AppStorageBackend> DownloadStreamSink for UpgradeSink<'_, B> {
    fn handle_next_data_chunk(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        let offset = self.offset;
        let result = self
            .shared
            .lock(|cell| cell.borrow_mut().storage.write(offset, data));
        if let Err(err) = result {
            debug!("Write of {} bytes at {:#x} failed: {}", data.len(), offset, err);
        }
        self.offset += data.len();
        result
    }
}

// Licensed under the Apache-2.0 license

//! Boot lifecycle state machine.
//!
//! Events that do not apply to the current state are rejected by the state
//! machine and leave it untouched; callers treat such rejections as no-ops.
//! `AppUpgradeInProgress` can only be left through `UpgradeFinished`.

use core::time::Duration;

use log::debug;
use smlang::statemachine;

statemachine! {
    derive_states: [Debug, Clone, Copy],
    derive_events: [Clone, Debug],
    transitions: {
        *NoAppToBoot + AppFound(Duration) / on_app_found = BootDelay,

        BootDelay + Poll(Duration) [is_boot_delay_expired] = ReadyToBoot,

        BootDelay + CancelBoot = BootCancelled,
        ReadyToBoot + CancelBoot = BootCancelled,

        BootDelay + RequestBoot = ReadyToBoot,
        BootCancelled + RequestBoot = ReadyToBoot,

        NoAppToBoot + UpgradeStarted = AppUpgradeInProgress,
        BootDelay + UpgradeStarted = AppUpgradeInProgress,
        BootCancelled + UpgradeStarted = AppUpgradeInProgress,

        AppUpgradeInProgress + UpgradeFinished = NoAppToBoot
    }
}

pub struct LifecycleContext {
    boot_delay: Duration,
    boot_delay_started_at: Duration,
}

impl LifecycleContext {
    pub fn new(boot_delay: Duration) -> Self {
        LifecycleContext {
            boot_delay,
            boot_delay_started_at: Duration::ZERO,
        }
    }

    pub fn boot_delay(&self) -> Duration {
        self.boot_delay
    }
}

impl StateMachineContext for LifecycleContext {
    fn is_boot_delay_expired(&self, now: &Duration) -> Result<bool, ()> {
        Ok(now.saturating_sub(self.boot_delay_started_at) >= self.boot_delay)
    }

    fn on_app_found(&mut self, now: Duration) -> Result<(), ()> {
        debug!("Boot delay of {:?} started", self.boot_delay);
        self.boot_delay_started_at = now;
        Ok(())
    }
}

/// Externally visible bootloader state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    NoAppToBoot,
    BootDelay,
    BootCancelled,
    AppUpgradeInProgress,
    ReadyToBoot,
}

impl State {
    /// Whether `upgrade_app` may start from this state.
    pub fn accepts_upgrade(self) -> bool {
        matches!(
            self,
            State::NoAppToBoot | State::BootDelay | State::BootCancelled
        )
    }
}

impl From<&States> for State {
    fn from(state: &States) -> Self {
        match state {
            States::NoAppToBoot => State::NoAppToBoot,
            States::BootDelay => State::BootDelay,
            States::BootCancelled => State::BootCancelled,
            States::AppUpgradeInProgress => State::AppUpgradeInProgress,
            States::ReadyToBoot => State::ReadyToBoot,
        }
    }
}

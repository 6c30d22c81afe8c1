// Licensed under the Apache-2.0 license

use core::time::Duration;

/// Boot delay used when the platform does not configure one.
pub const DEFAULT_BOOT_DELAY: Duration = Duration::from_secs(5);

/// Bootloader tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootloaderConfig {
    /// How long a valid application waits in `BootDelay` before it becomes
    /// `ReadyToBoot`.
    pub boot_delay: Duration,
}

impl BootloaderConfig {
    pub fn with_boot_delay_ms(boot_delay_ms: u64) -> Self {
        BootloaderConfig {
            boot_delay: Duration::from_millis(boot_delay_ms),
        }
    }
}

impl Default for BootloaderConfig {
    fn default() -> Self {
        BootloaderConfig {
            boot_delay: DEFAULT_BOOT_DELAY,
        }
    }
}

// Licensed under the Apache-2.0 license

use core::time::Duration;

/// Monotonic time source. The value is only compared against earlier
/// readings, so its epoch does not matter.
pub trait Clock {
    fn now(&self) -> Duration;
}

#[cfg(feature = "std")]
pub use std_clock::StdClock;

#[cfg(feature = "std")]
mod std_clock {
    extern crate std;

    use super::Clock;
    use core::time::Duration;
    use std::time::Instant;

    /// Host clock measuring time since its creation.
    pub struct StdClock {
        origin: Instant,
    }

    impl StdClock {
        pub fn new() -> Self {
            StdClock {
                origin: Instant::now(),
            }
        }
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for StdClock {
        fn now(&self) -> Duration {
            self.origin.elapsed()
        }
    }
}

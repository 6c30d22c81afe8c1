// Licensed under the Apache-2.0 license

use crc::{Crc, Digest, CRC_64_WE};

static CRC64_WE: Crc<u64> = Crc::<u64>::new(&CRC_64_WE);

/// Incremental CRC-64/WE accumulator used to certify application images.
///
/// Bytes must be fed in ascending storage order to reproduce the value stored
/// by the image-build tooling. A fresh accumulator is used for every pass.
#[derive(Clone)]
pub struct Crc64We {
    digest: Digest<'static, u64>,
}

impl Default for Crc64We {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc64We {
    pub fn new() -> Self {
        Self {
            digest: CRC64_WE.digest(),
        }
    }

    /// Folds `bytes` into the running checksum.
    pub fn add(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Returns the checksum of everything added so far. The accumulator
    /// stays usable.
    pub fn get(&self) -> u64 {
        self.digest.clone().finalize()
    }
}

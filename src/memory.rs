//! Memory-backed register file emulating the device's address space.

use crate::protocol::Version;

/// Address mask of the emulated device: 1M words of 32 bits.
pub const ADDRESS_MASK: u32 = 0x000F_FFFF;

/// A fixed-size addressable array of 32-bit words.
///
/// Every access masks the raw address into range first, so out-of-range
/// addresses wrap around instead of faulting. That mirrors how fixed-width
/// address decoding behaves on the real hardware and is deliberate.
pub struct RegisterFile {
    mask: u32,
    words: Vec<u32>,
}

impl RegisterFile {
    /// A register file spanning the full emulated address space.
    pub fn new() -> Self {
        Self::with_mask(ADDRESS_MASK)
    }

    /// A register file with a custom address mask (`size = mask + 1`).
    ///
    /// The mask must be of the form `2^n - 1`.
    pub fn with_mask(mask: u32) -> Self {
        debug_assert!((mask.wrapping_add(1) & mask) == 0, "mask must be 2^n - 1");
        RegisterFile {
            mask,
            words: vec![0; mask as usize + 1],
        }
    }

    /// Number of addressable words.
    pub fn size(&self) -> usize {
        self.words.len()
    }

    /// The address mask applied before every access.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn read(&self, address: u32) -> u32 {
        self.words[(address & self.mask) as usize]
    }

    pub fn write(&mut self, address: u32, word: u32) {
        self.words[(address & self.mask) as usize] = word;
    }

    /// `value = (value & and_term) | or_term`.
    ///
    /// Version 1 returns the post-modification value, version 2 (and later)
    /// the pre-modification value. The asymmetry is a wire-compatibility
    /// requirement of the protocol, not a choice this crate gets to make.
    pub fn rmw_bits(&mut self, address: u32, and_term: u32, or_term: u32, version: Version) -> u32 {
        let slot = (address & self.mask) as usize;
        let pre = self.words[slot];
        self.words[slot] = (pre & and_term) | or_term;
        match version {
            Version::V1 => self.words[slot],
            Version::V2 => pre,
        }
    }

    /// `value += addend` (wrapping).
    ///
    /// Same pre/post return policy as [`rmw_bits`](Self::rmw_bits).
    pub fn rmw_sum(&mut self, address: u32, addend: u32, version: Version) -> u32 {
        let slot = (address & self.mask) as usize;
        let pre = self.words[slot];
        self.words[slot] = pre.wrapping_add(addend);
        match version {
            Version::V1 => self.words[slot],
            Version::V2 => pre,
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

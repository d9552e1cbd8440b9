//! `Block`: a 128-bit opaque word used as the DPF seed/leaf type.
//!
//! Mirrors `original_source/FssWM/fss/fss.h`'s `block` typedef; unlike the
//! C++ original (an `emp::block` wrapping `__m128i`), this is a plain
//! `[u64; 2]` newtype — no platform-specific intrinsics, so the crate
//! builds on any target the `aes` crate supports.

use std::fmt;
use std::ops::{BitAnd, BitXor, BitXorAssign};

/// A 128-bit word, viewed as two little-endian `u64` halves.
///
/// `half(0)` is the low 64 bits, `half(1)` the high 64 bits. Bit `i` (`i <
/// 128`) lives in `half(i / 64)` at offset `i % 64`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Block {
    halves: [u64; 2],
}

impl Block {
    /// The all-zero block.
    pub const ZERO: Block = Block { halves: [0, 0] };

    /// Build a block from its two little-endian `u64` halves.
    pub const fn from_halves(low: u64, high: u64) -> Self {
        Block { halves: [low, high] }
    }

    /// The low (`half(0)`) or high (`half(1)`) 64-bit word.
    ///
    /// # Panics
    /// Panics if `i > 1`.
    pub fn half(&self, i: usize) -> u64 {
        self.halves[i]
    }

    /// Little-endian byte representation, matching the wire format of
    /// §6.1 (`Block` sends are 16 bytes).
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&self.halves[0].to_le_bytes());
        out[8..16].copy_from_slice(&self.halves[1].to_le_bytes());
        out
    }

    /// Inverse of [`Block::to_bytes`].
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let low = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let high = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        Block::from_halves(low, high)
    }

    /// Read bit `i` (0 = least significant bit of `half(0)`).
    ///
    /// # Panics
    /// Panics if `i >= 128`.
    pub fn get_bit(&self, i: usize) -> bool {
        assert!(i < 128, "bit index {i} out of range for a 128-bit block");
        let half = self.halves[i / 64];
        (half >> (i % 64)) & 1 == 1
    }

    /// The least significant bit of `half(0)` — used throughout the DPF
    /// tree descent as the carried "control bit".
    pub fn lsb(&self) -> bool {
        self.halves[0] & 1 == 1
    }

    /// Extract a `width`-bit window starting at bit `offset`, as a `u64`.
    /// Used by the DPF leaf step to pull the early-termination window
    /// (`nu` bits, nu <= 64) out of a leaf block.
    ///
    /// # Panics
    /// Panics if `offset + width > 128` or `width > 64`.
    pub fn extract_bits(&self, offset: usize, width: usize) -> u64 {
        assert!(width <= 64 && offset + width <= 128);
        if width == 0 {
            return 0;
        }
        // Assemble the 128 bits into a little-endian u128 and shift/mask.
        let whole = (self.halves[1] as u128) << 64 | self.halves[0] as u128;
        let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        ((whole >> offset) as u64) & mask
    }

    /// Treat the block as a column of 16 bytes and apply `mask` (`0x00` or
    /// `0xff` per byte) — used by the dot-product inner loop of
    /// `wm::obliv_select` to zero out non-selected leaves without a branch.
    pub fn and_mask_byte(&self, mask: u8) -> Self {
        let wide = mask as u64 * 0x0101_0101_0101_0101;
        Block::from_halves(self.halves[0] & wide, self.halves[1] & wide)
    }
}

impl BitXor for Block {
    type Output = Block;
    fn bitxor(self, rhs: Block) -> Block {
        Block::from_halves(self.halves[0] ^ rhs.halves[0], self.halves[1] ^ rhs.halves[1])
    }
}

impl BitXorAssign for Block {
    fn bitxor_assign(&mut self, rhs: Block) {
        self.halves[0] ^= rhs.halves[0];
        self.halves[1] ^= rhs.halves[1];
    }
}

impl BitAnd for Block {
    type Output = Block;
    fn bitand(self, rhs: Block) -> Block {
        Block::from_halves(self.halves[0] & rhs.halves[0], self.halves[1] & rhs.halves[1])
    }
}

impl From<[u8; 16]> for Block {
    fn from(bytes: [u8; 16]) -> Self {
        Block::from_bytes(bytes)
    }
}

impl From<Block> for [u8; 16] {
    fn from(b: Block) -> Self {
        b.to_bytes()
    }
}

impl From<u64> for Block {
    fn from(low: u64) -> Self {
        Block::from_halves(low, 0)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({:016x}{:016x})", self.halves[1], self.halves[0])
    }
}

//! Pairwise-keyed correlated randomness: every party derives fresh
//! replicated zero-shares purely from two AES keys it shares with its
//! ring neighbors, with no interaction.
//!
//! Grounded on §4.4: a dealer hands party `i` the two keys `K_i` (shared
//! with `next`) and `K_{i-1}` (shared with `prev`). Because party `i+1`
//! also holds `K_i`, both can independently derive the same pseudorandom
//! stream `x_i = PRG(K_i, counter)`; party `i`'s local zero-share
//! contribution is `r_i = x_i - x_{i-1}` (or `x_i ^ x_{i-1}` for the
//! binary flavor), which telescopes to zero once all three parties' `r_i`
//! are combined around the ring. This is the standard PRZS (pseudo-random
//! zero sharing) technique.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::errors::FssWmError;

/// The default per-stream buffer size (in blocks) mentioned in §4.4,
/// exposed here as the default exhaustion ceiling.
pub const DEFAULT_BUFFER_BLOCKS: u64 = 256;

/// A party's local correlated-randomness engine: two AES-128 streams keyed
/// by the secrets it shares with `next` (`key_own`) and `prev`
/// (`key_prev`).
pub struct CorrelatedRandomness {
    own_cipher: Aes128,
    prev_cipher: Aes128,
    counter: u64,
    capacity: u64,
}

impl CorrelatedRandomness {
    /// Build the engine from the two pairwise keys a dealer provisioned:
    /// `key_own` (shared with the party `next` in the ring) and
    /// `key_prev` (shared with `prev`). `capacity` bounds how many blocks
    /// may be drawn before [`FssWmError::RandomnessExhausted`] is raised;
    /// pass [`DEFAULT_BUFFER_BLOCKS`] when the caller has no stronger
    /// requirement.
    pub fn new(key_own: [u8; 16], key_prev: [u8; 16], capacity: u64) -> Self {
        CorrelatedRandomness {
            own_cipher: Aes128::new(&GenericArray::from(key_own)),
            prev_cipher: Aes128::new(&GenericArray::from(key_prev)),
            counter: 0,
            capacity,
        }
    }

    fn stream_block(cipher: &Aes128, counter: u64) -> u64 {
        let mut buf = [0u8; 16];
        buf[0..8].copy_from_slice(&counter.to_le_bytes());
        let mut block = GenericArray::from(buf);
        cipher.encrypt_block(&mut block);
        u64::from_le_bytes(block[0..8].try_into().unwrap())
    }

    fn advance(&mut self) -> Result<(u64, u64), FssWmError> {
        if self.counter >= self.capacity {
            return Err(FssWmError::RandomnessExhausted {
                requested: (self.counter + 1) as usize,
                available: self.capacity as usize,
            });
        }
        let x_own = Self::stream_block(&self.own_cipher, self.counter);
        let x_prev = Self::stream_block(&self.prev_cipher, self.counter);
        self.counter += 1;
        Ok((x_own, x_prev))
    }

    /// This party's contribution to a fresh binary (XOR-group) replicated
    /// zero-sharing.
    pub fn next_binary_zero(&mut self) -> Result<u64, FssWmError> {
        let (x_own, x_prev) = self.advance()?;
        Ok(x_own ^ x_prev)
    }

    /// This party's contribution to a fresh arithmetic (mod `2^64`)
    /// replicated zero-sharing.
    pub fn next_arithmetic_zero(&mut self) -> Result<u64, FssWmError> {
        let (x_own, x_prev) = self.advance()?;
        Ok(x_own.wrapping_sub(x_prev))
    }

    /// How many blocks remain before the buffer is exhausted.
    pub fn remaining(&self) -> u64 {
        self.capacity - self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_zero_shares_telescope_to_zero() {
        let k0 = [1u8; 16];
        let k1 = [2u8; 16];
        let k2 = [3u8; 16];

        // party i holds (key_own = k_i, key_prev = k_{i-1}).
        let mut p0 = CorrelatedRandomness::new(k0, k2, DEFAULT_BUFFER_BLOCKS);
        let mut p1 = CorrelatedRandomness::new(k1, k0, DEFAULT_BUFFER_BLOCKS);
        let mut p2 = CorrelatedRandomness::new(k2, k1, DEFAULT_BUFFER_BLOCKS);

        for _ in 0..8 {
            let r0 = p0.next_binary_zero().unwrap();
            let r1 = p1.next_binary_zero().unwrap();
            let r2 = p2.next_binary_zero().unwrap();
            assert_eq!(r0 ^ r1 ^ r2, 0);
        }
    }

    #[test]
    fn arithmetic_zero_shares_telescope_to_zero() {
        let k0 = [10u8; 16];
        let k1 = [20u8; 16];
        let k2 = [30u8; 16];

        let mut p0 = CorrelatedRandomness::new(k0, k2, DEFAULT_BUFFER_BLOCKS);
        let mut p1 = CorrelatedRandomness::new(k1, k0, DEFAULT_BUFFER_BLOCKS);
        let mut p2 = CorrelatedRandomness::new(k2, k1, DEFAULT_BUFFER_BLOCKS);

        for _ in 0..8 {
            let r0 = p0.next_arithmetic_zero().unwrap();
            let r1 = p1.next_arithmetic_zero().unwrap();
            let r2 = p2.next_arithmetic_zero().unwrap();
            assert_eq!(r0.wrapping_add(r1).wrapping_add(r2), 0);
        }
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut p = CorrelatedRandomness::new([1u8; 16], [2u8; 16], 2);
        p.next_binary_zero().unwrap();
        p.next_binary_zero().unwrap();
        assert!(p.next_binary_zero().is_err());
    }
}

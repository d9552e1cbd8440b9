//! The keyed AES-128 pseudo-random generator the DPF tree descent runs on.
//!
//! `Expand`/`DoubleExpand` compute `AES_k(seed) XOR seed` — a Davies-Meyer
//! construction, not a CTR-DRBG. This is the same "MMO^pi" shape used for
//! PRSS generation in `ipa-core`'s `protocol::prss::crypto::Generator`
//! (`other_examples`), ported from `original_source/FssWM/fss/prg.cpp`.
//! Two fixed global AES keys (`left`/`right`) stand in for the two fixed
//! `kPrgKeySeedLeft`/`kPrgKeySeedRight` constants of the original.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

use super::block::Block;

/// Fixed global left/right AES-128 keys the whole crate's DPF instances
/// share. They need not be secret (the PRG's security comes from the
/// unknown DPF correction words, not from these keys) but must be
/// identical across every party and every run, or full-domain expansions
/// computed by different keys would not XOR down to a point function.
const PRG_KEY_LEFT: [u8; 16] = [
    0xf2, 0x41, 0x6b, 0xf5, 0x4f, 0x02, 0xe4, 0x46, 0xcc, 0x2c, 0xe9, 0x3f, 0xdb, 0xcc, 0xcc, 0x28,
];
const PRG_KEY_RIGHT: [u8; 16] = [
    0x65, 0x77, 0x6b, 0x09, 0x91, 0xb8, 0xd2, 0x25, 0xda, 0xc1, 0x85, 0x83, 0xc2, 0x12, 0x33, 0x49,
];

/// Keyed AES-128 expander used by DPF key generation and evaluation.
///
/// `Prg` is stateless beyond the two fixed round-key schedules, so it is
/// `Clone`/`Copy`-free but cheap to construct; callers typically build one
/// per `DpfKeyGenerator`/`DpfEvaluator` and reuse it across the whole tree
/// descent.
pub struct Prg {
    left: Aes128,
    right: Aes128,
}

impl Default for Prg {
    fn default() -> Self {
        Self::new()
    }
}

impl Prg {
    /// Construct the PRG under the crate's fixed global keys.
    pub fn new() -> Self {
        Prg {
            left: Aes128::new(&GenericArray::from(PRG_KEY_LEFT)),
            right: Aes128::new(&GenericArray::from(PRG_KEY_RIGHT)),
        }
    }

    fn encrypt(cipher: &Aes128, seed: Block) -> Block {
        let mut buf = GenericArray::from(seed.to_bytes());
        cipher.encrypt_block(&mut buf);
        let encrypted = Block::from_bytes(buf.into());
        encrypted ^ seed
    }

    /// `AES_k(seed) XOR seed`, using the left key if `right_key` is false,
    /// the right key otherwise.
    pub fn expand(&self, seed: Block, right_key: bool) -> Block {
        if right_key {
            Self::encrypt(&self.right, seed)
        } else {
            Self::encrypt(&self.left, seed)
        }
    }

    /// Expand a seed under both keys in one call, returning
    /// `(left_seed, right_seed, left_ctrl, right_ctrl)` where the control
    /// bits are the least-significant bit of each expanded half.
    ///
    /// This is the DPF tree's single step: `G(seed) -> (Lseed, Rseed,
    /// Lbit, Rbit)`.
    pub fn double_expand(&self, seed: Block) -> (Block, Block, bool, bool) {
        let left = self.expand(seed, false);
        let right = self.expand(seed, true);
        (left, right, left.lsb(), right.lsb())
    }

    /// Batched form of [`Prg::double_expand`] over up to 16 seeds at once.
    ///
    /// The reference implementation pipelines AES-NI encryptions in
    /// lock-step across a batch (`emp::ParaEnc`); this port keeps the same
    /// call shape (one call processes the whole batch) but performs the
    /// encryptions back-to-back rather than truly interleaved, since the
    /// `aes` crate's software/AES-NI backend already pipelines adjacent
    /// `encrypt_block` calls on supporting hardware.
    pub fn double_expand_batch(&self, seeds: &[Block]) -> Vec<(Block, Block, bool, bool)> {
        debug_assert!(seeds.len() <= 16, "batch must fit the DPF level fan-out cap");
        seeds.iter().map(|&s| self.double_expand(s)).collect()
    }
}

//! The secure rank-CF walk: one step of a wavelet-matrix rank query per
//! bit of the query character, chained across a shared interval position.
//!
//! Grounded on `original_source/FssWM/wm/fsswm.h`. Each level narrows a
//! replicated-shared position `p` by obliviously reading the level's
//! rank-0 table (an [`crate::wm::obliv_select`] call) and selecting
//! between the rank-0 and rank-1 branch with
//! [`crate::sharing::arithmetic_3p::select`], driven by that level's bit
//! of the (also shared) query character.

use anyhow::{Context, Result};
use rand::RngCore;

use crate::channel_utils::RawChannel;
use crate::sharing::arithmetic_3p;
use crate::sharing::correlated_randomness::CorrelatedRandomness;
use crate::sharing::share_types::RepShare;
use crate::wire::{put_len_prefixed, put_u64, Cursor, WireCodec};
use crate::wm::obliv_select::{self, OblivSelectKey, OblivSelectKeyGenerator, OblivSelectParameters};
use crate::wm::plain_fm_index::bits_for_sigma;

/// Parameter envelope: `d` is the bitwidth of the interval position `p`
/// (so the table rows are `2^d` long), `sigma` the alphabet size (so the
/// walk runs `bits_for_sigma(sigma)` levels, one per bit of the queried
/// character, MSB first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FssWMParameters {
    d: u32,
    sigma: u32,
}

impl FssWMParameters {
    /// Build the envelope for a `2^d`-row table over a `sigma`-symbol
    /// alphabet.
    pub fn new(d: u32, sigma: u32) -> Self {
        FssWMParameters { d, sigma }
    }

    /// Row length, `2^d`.
    pub fn domain_size(&self) -> usize {
        1usize << self.d
    }

    /// Number of rank-CF levels, `bits_for_sigma(sigma)`.
    pub fn num_levels(&self) -> usize {
        bits_for_sigma(self.sigma) as usize
    }
}

/// One party's key for walking every level of one wavelet-matrix query.
#[derive(Debug, Clone)]
pub struct FssWMKey {
    params: FssWMParameters,
    levels: Vec<OblivSelectKey>,
}

/// Generates [`FssWMKey`]s for a fixed [`FssWMParameters`] envelope.
pub struct FssWMKeyGenerator {
    params: FssWMParameters,
}

impl FssWMKeyGenerator {
    /// Build a generator for `params`.
    pub fn new(params: FssWMParameters) -> Self {
        FssWMKeyGenerator { params }
    }

    /// Generate the three parties' keys for one fresh walk (one
    /// [`OblivSelectKey`] triple per level).
    pub fn generate_keys<R: RngCore>(&self, rng: &mut R) -> Result<[FssWMKey; 3]> {
        let obliv_gen = OblivSelectKeyGenerator::new(OblivSelectParameters::new(self.params.d));
        let mut per_level = Vec::with_capacity(self.params.num_levels());
        for _ in 0..self.params.num_levels() {
            per_level.push(obliv_gen.generate_keys([1, 1, 1], rng).with_context(|| format!("@{}:{}", file!(), line!()))?);
        }

        let mut keys: [Vec<OblivSelectKey>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for level_keys in per_level {
            for (me, k) in level_keys.into_iter().enumerate() {
                keys[me].push(k);
            }
        }

        let [k0, k1, k2] = keys;
        Ok([
            FssWMKey { params: self.params, levels: k0 },
            FssWMKey { params: self.params, levels: k1 },
            FssWMKey { params: self.params, levels: k2 },
        ])
    }
}

impl WireCodec for FssWMKey {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, self.params.d as u64);
        put_u64(&mut buf, self.params.sigma as u64);
        put_u64(&mut buf, self.levels.len() as u64);
        for level in &self.levels {
            put_len_prefixed(&mut buf, &level.to_wire());
        }
        buf
    }

    fn from_wire(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let d = cursor.get_u64()? as u32;
        let sigma = cursor.get_u64()? as u32;
        let params = FssWMParameters::new(d, sigma);
        let num_levels = cursor.get_u64()? as usize;
        let mut levels = Vec::with_capacity(num_levels);
        for _ in 0..num_levels {
            levels.push(OblivSelectKey::from_wire(cursor.get_len_prefixed()?)?);
        }
        anyhow::ensure!(cursor.remaining() == 0, "trailing bytes in FssWMKey wire data");
        Ok(FssWMKey { params, levels })
    }
}

/// A single level's rank-0 table, held as this party's two replicated
/// slots (`own` is `s_me`, `prev` is `s_{me-1}`), each `2^d` entries long.
pub struct RankTableRow<'a> {
    /// This party's own slot of the level's rank-0 table.
    pub own: &'a [u64],
    /// The neighboring slot this party also holds.
    pub prev: &'a [u64],
}

/// Walk every level of one rank-CF query: `p` is the replicated-shared
/// current interval position, `c_bits` is one arithmetic replicated
/// share per level of the queried character's bits (MSB first, `0` or
/// `1`), and `tables[i]` is level `i`'s rank-0 row.
pub fn evaluate<C: RawChannel>(
    key: &FssWMKey,
    mut p: RepShare,
    c_bits: &[RepShare],
    tables: &[RankTableRow],
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<RepShare> {
    debug_assert_eq!(key.levels.len(), key.params.num_levels());
    debug_assert_eq!(c_bits.len(), key.params.num_levels());
    debug_assert_eq!(tables.len(), key.params.num_levels());

    for i in 0..key.params.num_levels() {
        let rank0 = obliv_select::evaluate(&key.levels[i], p, tables[i].own, tables[i].prev, corr, prev_link, next_link)
            .with_context(|| format!("@{}:{} level {i}", file!(), line!()))?;

        let domain = key.params.domain_size();
        let total_zeros = RepShare::new(tables[i].own[domain - 1], tables[i].prev[domain - 1]);
        let rank1 = arithmetic_3p::add(arithmetic_3p::sub(p, rank0), total_zeros);

        p = arithmetic_3p::select(rank0, rank1, c_bits[i], corr, prev_link, next_link)
            .with_context(|| format!("@{}:{} level {i}", file!(), line!()))?;
    }

    Ok(p)
}

/// Walk two positions (`f`, `g`) through the same query character, one
/// level at a time, sharing each level's [`obliv_select::evaluate_parallel`]
/// call so the DPF full-domain expansion for that level's key runs once
/// instead of twice.
pub fn evaluate_joint<C: RawChannel>(
    key: &FssWMKey,
    mut f: RepShare,
    mut g: RepShare,
    c_bits: &[RepShare],
    tables: &[RankTableRow],
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<(RepShare, RepShare)> {
    debug_assert_eq!(key.levels.len(), key.params.num_levels());
    debug_assert_eq!(c_bits.len(), key.params.num_levels());
    debug_assert_eq!(tables.len(), key.params.num_levels());

    let domain = key.params.domain_size();
    for i in 0..key.params.num_levels() {
        let (f_rank0, g_rank0) =
            obliv_select::evaluate_parallel(&key.levels[i], f, g, tables[i].own, tables[i].prev, corr, prev_link, next_link)
                .with_context(|| format!("@{}:{} level {i}", file!(), line!()))?;

        let total_zeros = RepShare::new(tables[i].own[domain - 1], tables[i].prev[domain - 1]);
        let f_rank1 = arithmetic_3p::add(arithmetic_3p::sub(f, f_rank0), total_zeros);
        let g_rank1 = arithmetic_3p::add(arithmetic_3p::sub(g, g_rank0), total_zeros);

        f = arithmetic_3p::select(f_rank0, f_rank1, c_bits[i], corr, prev_link, next_link)
            .with_context(|| format!("@{}:{} level {i} (f)", file!(), line!()))?;
        g = arithmetic_3p::select(g_rank0, g_rank1, c_bits[i], corr, prev_link, next_link)
            .with_context(|| format!("@{}:{} level {i} (g)", file!(), line!()))?;
    }

    Ok((f, g))
}

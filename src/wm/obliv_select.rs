//! Oblivious select ("RingOa"): read a replicated-binary-shared table row
//! at a replicated-shared index, producing a replicated arithmetic share
//! of the entry.
//!
//! Grounded on `original_source/FssWM/wm/obliv_select.h` and
//! `obliv_select.cpp`: every row of a rank-0 table is split across the ring as
//! three slots `s_0, s_1, s_2` with `T[p] = s_0 + s_1 + s_2 mod 2^64`;
//! party `i` locally holds `s_i` ("own") and `s_{i-1}` ("prev"), mirroring
//! the `data0`/`data1` convention of [`crate::sharing::share_types::RepShare`].
//! Reading `T[p]` obliviously is a per-slot two-party DPF-PIR between the
//! two parties who hold that slot, masked by a publicly-opened shift of
//! the shared index, followed by the standard additive-to-replicated
//! re-share (mirrors [`crate::sharing::arithmetic_3p::mul`]'s
//! mask-and-exchange tail). See DESIGN.md for why this runs as two
//! network round trips (mask open, then re-share) rather than the single
//! round a fully batched implementation could reach.

use anyhow::{Context, Result};
use rand::RngCore;

use crate::channel_utils::{read_vec_u64, write_vec_u64, RawChannel};
use crate::fss::{Block, DpfEvaluator, DpfKey, DpfKeyGenerator, DpfParameters, EvalType, OutputMode};
use crate::runtime::RuntimeConfig;
use crate::sharing::arithmetic_3p;
use crate::sharing::correlated_randomness::CorrelatedRandomness;
use crate::sharing::share_types::RepShare;
use crate::wire::{put_len_prefixed, put_rep_share, put_u64, Cursor, WireCodec};

/// Parameter envelope for oblivious select over a table row of `2^d`
/// entries. Always derives a `ShiftedAdditive` DPF envelope, since every
/// read returns an arithmetic rank count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OblivSelectParameters {
    d: u32,
}

impl OblivSelectParameters {
    /// Build the envelope for a `2^d`-entry row.
    pub fn new(d: u32) -> Self {
        OblivSelectParameters { d }
    }

    /// Row length, `2^d`.
    pub fn domain_size(&self) -> usize {
        1usize << self.d
    }

    fn dpf_params(&self) -> DpfParameters {
        DpfParameters::new(self.d, self.d, EvalType::IterSingleBatch, OutputMode::ShiftedAdditive)
            .expect("d <= 64 by construction")
    }
}

/// This party's key material for one oblivious-select slot pair: a DPF
/// keyed at a dealer-chosen point `r`, a replicated share of `r` (needed
/// to publicly open `p - r`), and a `+-1` sign correction (the "odd/even"
/// correction the ring topology needs when a slot pair wraps around).
#[derive(Debug, Clone)]
struct SlotKey {
    dpf: DpfKey,
    r_share: RepShare,
    sign: i64,
}

/// One party's complete key for reading a single table row.
#[derive(Debug, Clone)]
pub struct OblivSelectKey {
    params: OblivSelectParameters,
    own: SlotKey,
    prev: SlotKey,
}

/// Generate the three parties' keys for reading a fresh table row.
/// `table_values_are_signed` selects `+1`/`-1`; callers doing a plain
/// additive read (the common case) pass `1` for both signs.
pub struct OblivSelectKeyGenerator {
    params: OblivSelectParameters,
}

impl OblivSelectKeyGenerator {
    /// Build a generator for `params`.
    pub fn new(params: OblivSelectParameters) -> Self {
        OblivSelectKeyGenerator { params }
    }

    /// Generate one [`OblivSelectKey`] per party. `signs` carries the
    /// `+-1` correction each of the three slots (`s_0, s_1, s_2`) should
    /// apply; pass `[1, 1, 1]` for an unsigned table.
    pub fn generate_keys<R: RngCore>(&self, signs: [i64; 3], rng: &mut R) -> Result<[OblivSelectKey; 3], anyhow::Error> {
        let dpf_gen = DpfKeyGenerator::new(self.params.dpf_params());
        let domain = self.params.domain_size() as u64;

        // One DPF pair and one replicated share of r per slot k, held by
        // the pair (party k, party k+1).
        let mut dpf_pairs = Vec::with_capacity(3);
        let mut r_shares = Vec::with_capacity(3);
        for _ in 0..3 {
            let r = rng.next_u64() % domain;
            let (k0, k1) = dpf_gen
                .generate_keys(r, 1, rng)
                .with_context(|| format!("@{}:{}", file!(), line!()))?;
            dpf_pairs.push((k0, k1));
            let shares = arithmetic_3p::share_local(r, rng.next_u64(), rng.next_u64());
            r_shares.push(shares);
        }

        let mut keys: Vec<OblivSelectKey> = Vec::with_capacity(3);
        for me in 0..3usize {
            let prev_slot = (me + 2) % 3;
            let (own_dpf, _) = dpf_pairs[me].clone();
            let (_, prev_dpf) = dpf_pairs[prev_slot].clone();
            keys.push(OblivSelectKey {
                params: self.params,
                own: SlotKey {
                    dpf: own_dpf,
                    r_share: r_shares[me][me],
                    sign: signs[me],
                },
                prev: SlotKey {
                    dpf: prev_dpf,
                    r_share: r_shares[prev_slot][me],
                    sign: signs[prev_slot],
                },
            });
        }
        Ok([keys[0].clone(), keys[1].clone(), keys[2].clone()])
    }
}

/// Open any number of arithmetic replicated shares in a single round: all
/// `data0` halves go out on `next`, the matching halves come back on
/// `prev`, and each entry reconstructs independently.
fn open_many<C: RawChannel>(diffs: &[RepShare], prev_link: &mut C, next_link: &mut C) -> Result<Vec<u64>> {
    let to_send: Vec<u64> = diffs.iter().map(|s| s.data0).collect();
    write_vec_u64(next_link, &to_send).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let received = read_vec_u64(prev_link).with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(diffs.iter().zip(received).map(|(s, r)| s.data0.wrapping_add(s.data1).wrapping_add(r)).collect())
}

/// One slot's local dot product against a shifted table, §4.5 step 3.
/// Farmed out to a `crossbeam::scope` worker pool once the row is large
/// enough that the per-thread spawn overhead pays for itself (see
/// [`RuntimeConfig::should_parallelize`]).
fn dot_product(uv: &[Block], shift: u64, sign: i64, table: &[u64], domain: usize) -> u64 {
    let cfg = RuntimeConfig::default();
    let local = if cfg.should_parallelize(uv.len()) {
        dot_product_parallel(uv, shift, table, domain)
    } else {
        dot_product_inline(uv, shift, table, domain)
    };
    sign_scale(local, sign)
}

fn dot_product_inline(uv: &[Block], shift: u64, table: &[u64], domain: usize) -> u64 {
    let mut local = 0u64;
    for (x, block) in uv.iter().enumerate() {
        let idx = (x + shift as usize) % domain;
        local = local.wrapping_add(block.half(0).wrapping_mul(table[idx]));
    }
    local
}

fn dot_product_parallel(uv: &[Block], shift: u64, table: &[u64], domain: usize) -> u64 {
    let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).max(1);
    let chunk_size = ((uv.len() + workers - 1) / workers).max(1);
    crossbeam::scope(|scope| {
        let handles: Vec<_> = uv
            .chunks(chunk_size)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let start = chunk_idx * chunk_size;
                scope.spawn(move |_| {
                    let mut partial = 0u64;
                    for (offset, block) in chunk.iter().enumerate() {
                        let idx = (start + offset + shift as usize) % domain;
                        partial = partial.wrapping_add(block.half(0).wrapping_mul(table[idx]));
                    }
                    partial
                })
            })
            .collect();
        handles.into_iter().fold(0u64, |acc, h| acc.wrapping_add(h.join().unwrap()))
    })
    .expect("worker thread panicked")
}

/// Evaluate one oblivious select: read `table_own` (this party's `s_me`
/// slot) and `table_prev` (its `s_{me-1}` slot), both of length `2^d`, at
/// the replicated-shared index `p`, returning a replicated share of the
/// reconstructed entry.
pub fn evaluate<C: RawChannel>(
    key: &OblivSelectKey,
    p: RepShare,
    table_own: &[u64],
    table_prev: &[u64],
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<RepShare> {
    let domain = key.params.domain_size();
    debug_assert_eq!(table_own.len(), domain);
    debug_assert_eq!(table_prev.len(), domain);

    let diff_own = arithmetic_3p::sub(p, key.own.r_share);
    let diff_prev = arithmetic_3p::sub(p, key.prev.r_share);
    let opened = open_many(&[diff_own, diff_prev], prev_link, next_link).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let (m_own, m_prev) = (opened[0], opened[1]);

    let dpf_eval = DpfEvaluator::new(key.params.dpf_params());
    let uv_own = dpf_eval.full_domain(&key.own.dpf).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let uv_prev = dpf_eval.full_domain(&key.prev.dpf).with_context(|| format!("@{}:{}", file!(), line!()))?;

    let local_own = dot_product(&uv_own, m_own, key.own.sign, table_own, domain);
    let local_prev = dot_product(&uv_prev, m_prev, key.prev.sign, table_prev, domain);

    let total = local_own.wrapping_add(local_prev);
    let mask = corr.next_arithmetic_zero().with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z0 = total.wrapping_add(mask);
    write_vec_u64(next_link, &[z0]).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z1 = read_vec_u64(prev_link).with_context(|| format!("@{}:{}", file!(), line!()))?[0];

    Ok(RepShare::new(z0, z1))
}

/// The "parallel" variant (§4.5): read the same key's row at two
/// independent shared indices `p1`, `p2` in one pass. Both mask
/// reconstructions are batched into a single round, the DPF full-domain
/// expansion (`uv_own`/`uv_prev`) runs once and is reused for both dot
/// products, and the final re-share masks are likewise sent together —
/// halving the AES cost against two calls to [`evaluate`] at the cost of
/// one combined round instead of two separate ones.
pub fn evaluate_parallel<C: RawChannel>(
    key: &OblivSelectKey,
    p1: RepShare,
    p2: RepShare,
    table_own: &[u64],
    table_prev: &[u64],
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<(RepShare, RepShare)> {
    let domain = key.params.domain_size();
    debug_assert_eq!(table_own.len(), domain);
    debug_assert_eq!(table_prev.len(), domain);

    let diffs = [
        arithmetic_3p::sub(p1, key.own.r_share),
        arithmetic_3p::sub(p1, key.prev.r_share),
        arithmetic_3p::sub(p2, key.own.r_share),
        arithmetic_3p::sub(p2, key.prev.r_share),
    ];
    let opened = open_many(&diffs, prev_link, next_link).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let (m_own1, m_prev1, m_own2, m_prev2) = (opened[0], opened[1], opened[2], opened[3]);

    let dpf_eval = DpfEvaluator::new(key.params.dpf_params());
    let uv_own = dpf_eval.full_domain(&key.own.dpf).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let uv_prev = dpf_eval.full_domain(&key.prev.dpf).with_context(|| format!("@{}:{}", file!(), line!()))?;

    let total1 = dot_product(&uv_own, m_own1, key.own.sign, table_own, domain)
        .wrapping_add(dot_product(&uv_prev, m_prev1, key.prev.sign, table_prev, domain));
    let total2 = dot_product(&uv_own, m_own2, key.own.sign, table_own, domain)
        .wrapping_add(dot_product(&uv_prev, m_prev2, key.prev.sign, table_prev, domain));

    let mask1 = corr.next_arithmetic_zero().with_context(|| format!("@{}:{}", file!(), line!()))?;
    let mask2 = corr.next_arithmetic_zero().with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z0_1 = total1.wrapping_add(mask1);
    let z0_2 = total2.wrapping_add(mask2);
    write_vec_u64(next_link, &[z0_1, z0_2]).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let received = read_vec_u64(prev_link).with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok((RepShare::new(z0_1, received[0]), RepShare::new(z0_2, received[1])))
}

impl WireCodec for OblivSelectKey {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, self.params.d as u64);
        for slot in [&self.own, &self.prev] {
            put_len_prefixed(&mut buf, &slot.dpf.serialize());
            put_rep_share(&mut buf, slot.r_share);
            put_u64(&mut buf, slot.sign as u64);
        }
        buf
    }

    fn from_wire(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let d = cursor.get_u64()? as u32;
        let params = OblivSelectParameters::new(d);

        let mut read_slot = |cursor: &mut Cursor| -> Result<SlotKey> {
            let dpf = DpfKey::deserialize(cursor.get_len_prefixed()?)?;
            let r_share = cursor.get_rep_share()?;
            let sign = cursor.get_u64()? as i64;
            Ok(SlotKey { dpf, r_share, sign })
        };
        let own = read_slot(&mut cursor)?;
        let prev = read_slot(&mut cursor)?;
        anyhow::ensure!(cursor.remaining() == 0, "trailing bytes in OblivSelectKey wire data");

        Ok(OblivSelectKey { params, own, prev })
    }
}

fn sign_scale(v: u64, sign: i64) -> u64 {
    if sign >= 0 {
        v
    } else {
        v.wrapping_neg()
    }
}

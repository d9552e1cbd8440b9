//! ZeroTest: a DPF-based gadget producing a replicated (binary) share of
//! `1{x = 0}` for a replicated-shared `x`.
//!
//! Grounded on `original_source/FssWM/wm/zero_test.h`. The dealer shares a
//! single random mask `r` (binary/XOR flavor, three-way) and generates one
//! DPF pair at point `r`; party 0 and party 1 hold the two DPF halves,
//! party 2 holds none. Masking `x` with `r` and opening it publicly (one
//! round, all three parties) reduces the test to `1{m = r}`, which
//! party 0 and party 1 jointly hold as an XOR-additive pair; party 2
//! contributes zero. All three then run the usual mask-and-exchange
//! re-share (mirrors [`crate::sharing::binary_3p::and`]'s tail) to land a
//! proper replicated share. [`evaluate_batch`] amortizes both rounds
//! across many tests at once.

use anyhow::{Context, Result};
use rand::RngCore;

use crate::channel_utils::{read_vec_u64, write_vec_u64, RawChannel};
use crate::fss::{DpfEvaluator, DpfKey, DpfKeyGenerator, DpfParameters, EvalType, OutputMode};
use crate::sharing::binary_3p;
use crate::sharing::correlated_randomness::CorrelatedRandomness;
use crate::sharing::share_types::RepShare;
use crate::wire::{put_len_prefixed, put_rep_share, put_u64, Cursor, WireCodec};

/// Parameter envelope: the bitwidth `n` of the value being tested for
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroTestParameters {
    n: u32,
}

impl ZeroTestParameters {
    /// Build the envelope for an `n`-bit tested value.
    pub fn new(n: u32) -> Self {
        ZeroTestParameters { n }
    }

    fn dpf_params(&self) -> DpfParameters {
        DpfParameters::new(self.n, 1, EvalType::IterSingleBatch, OutputMode::SingleBitMask).expect("n <= 64 by construction")
    }
}

/// One party's key for testing one replicated-shared value against zero.
/// `dpf` is `Some` for the two parties holding the actual DPF pair
/// (conventionally party 0 and party 1) and `None` for the third, who
/// contributes no DPF evaluation and relies entirely on the final
/// re-share to end up with a valid share of the result.
#[derive(Debug, Clone)]
pub struct ZeroTestKey {
    params: ZeroTestParameters,
    dpf: Option<DpfKey>,
    r_share: RepShare,
}

/// Generates [`ZeroTestKey`]s for a fixed [`ZeroTestParameters`] envelope.
pub struct ZeroTestKeyGenerator {
    params: ZeroTestParameters,
}

impl ZeroTestKeyGenerator {
    /// Build a generator for `params`.
    pub fn new(params: ZeroTestParameters) -> Self {
        ZeroTestKeyGenerator { params }
    }

    /// Generate the three parties' keys for one fresh zero-test.
    pub fn generate_keys<R: RngCore>(&self, rng: &mut R) -> Result<[ZeroTestKey; 3]> {
        let dpf_gen = DpfKeyGenerator::new(self.params.dpf_params());
        let modulus = if self.params.n >= 64 { u64::MAX } else { (1u64 << self.params.n) - 1 };
        let r = rng.next_u64() & modulus;
        let (k0, k1) = dpf_gen.generate_keys(r, 1, rng).with_context(|| format!("@{}:{}", file!(), line!()))?;

        let r_shares = binary_3p::share_local(r, rng.next_u64(), rng.next_u64());

        Ok([
            ZeroTestKey { params: self.params, dpf: Some(k0), r_share: r_shares[0] },
            ZeroTestKey { params: self.params, dpf: Some(k1), r_share: r_shares[1] },
            ZeroTestKey { params: self.params, dpf: None, r_share: r_shares[2] },
        ])
    }
}

impl WireCodec for ZeroTestKey {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, self.params.n as u64);
        match &self.dpf {
            Some(dpf) => {
                put_u64(&mut buf, 1);
                put_len_prefixed(&mut buf, &dpf.serialize());
            }
            None => put_u64(&mut buf, 0),
        }
        put_rep_share(&mut buf, self.r_share);
        buf
    }

    fn from_wire(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let n = cursor.get_u64()? as u32;
        let params = ZeroTestParameters::new(n);
        let has_dpf = cursor.get_u64()?;
        let dpf = if has_dpf == 1 { Some(DpfKey::deserialize(cursor.get_len_prefixed()?)?) } else { None };
        let r_share = cursor.get_rep_share()?;
        anyhow::ensure!(cursor.remaining() == 0, "trailing bytes in ZeroTestKey wire data");
        Ok(ZeroTestKey { params, dpf, r_share })
    }
}

/// Test a single replicated-shared value `x` for equality with zero,
/// returning a replicated binary share of the 0/1 result.
pub fn evaluate<C: RawChannel>(
    key: &ZeroTestKey,
    x: RepShare,
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<RepShare> {
    let mut out = evaluate_batch(std::slice::from_ref(key), std::slice::from_ref(&x), corr, prev_link, next_link)?;
    Ok(out.pop().unwrap())
}

/// Batched zero-test: the masked-value reconstructions for every entry
/// are sent in one combined round trip, DPFs are evaluated locally, and
/// the re-share masks are sent in a second combined round trip.
pub fn evaluate_batch<C: RawChannel>(
    keys: &[ZeroTestKey],
    xs: &[RepShare],
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<Vec<RepShare>> {
    debug_assert_eq!(keys.len(), xs.len());

    let masked: Vec<RepShare> = keys.iter().zip(xs).map(|(key, &x)| binary_3p::xor(x, key.r_share)).collect();
    let to_send: Vec<u64> = masked.iter().map(|s| s.data0).collect();
    write_vec_u64(next_link, &to_send).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let received = read_vec_u64(prev_link).with_context(|| format!("@{}:{}", file!(), line!()))?;

    let mut locals = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let m = masked[i].data0 ^ masked[i].data1 ^ received[i];
        let local = match &key.dpf {
            Some(dpf) => {
                let dpf_eval = DpfEvaluator::new(key.params.dpf_params());
                dpf_eval.evaluate_at(dpf, m).with_context(|| format!("@{}:{}", file!(), line!()))?
            }
            None => 0,
        };
        locals.push(local);
    }

    let mut z0s = Vec::with_capacity(keys.len());
    for &local in &locals {
        let mask = corr.next_binary_zero().with_context(|| format!("@{}:{}", file!(), line!()))?;
        z0s.push(local ^ mask);
    }
    write_vec_u64(next_link, &z0s).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z1s = read_vec_u64(prev_link).with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(z0s.into_iter().zip(z1s).map(|(z0, z1)| RepShare::new(z0, z1)).collect())
}

/// Generate zero-test keys whose mask `r` is shared arithmetically
/// instead of via XOR. Used to test an additive replicated difference
/// (e.g. `f_sh - g_sh` in the FM-index interval walk) for equality with
/// zero without first converting it to a binary sharing.
pub fn generate_keys_arithmetic<R: RngCore>(params: ZeroTestParameters, rng: &mut R) -> Result<[ZeroTestKey; 3]> {
    let dpf_gen = DpfKeyGenerator::new(params.dpf_params());
    let modulus = if params.n >= 64 { u64::MAX } else { (1u64 << params.n) - 1 };
    let r = rng.next_u64() & modulus;
    let (k0, k1) = dpf_gen.generate_keys(r, 1, rng).with_context(|| format!("@{}:{}", file!(), line!()))?;

    let r_shares = crate::sharing::arithmetic_3p::share_local(r, rng.next_u64(), rng.next_u64());

    Ok([
        ZeroTestKey { params, dpf: Some(k0), r_share: r_shares[0] },
        ZeroTestKey { params, dpf: Some(k1), r_share: r_shares[1] },
        ZeroTestKey { params, dpf: None, r_share: r_shares[2] },
    ])
}

/// Batched zero-test over additive (arithmetic) replicated shares: the
/// mask `x + r` is opened by wrapping addition rather than XOR, and the
/// final re-share uses an arithmetic zero-share. The DPF point-function
/// check (`m == r`) is flavor-agnostic, so the same key material shape
/// and evaluation logic apply.
pub fn evaluate_arithmetic_batch<C: RawChannel>(
    keys: &[ZeroTestKey],
    xs: &[RepShare],
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<Vec<RepShare>> {
    debug_assert_eq!(keys.len(), xs.len());

    let masked: Vec<RepShare> = keys.iter().zip(xs).map(|(key, &x)| crate::sharing::arithmetic_3p::add(x, key.r_share)).collect();
    let to_send: Vec<u64> = masked.iter().map(|s| s.data0).collect();
    write_vec_u64(next_link, &to_send).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let received = read_vec_u64(prev_link).with_context(|| format!("@{}:{}", file!(), line!()))?;

    let mut locals = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let m = masked[i].data0.wrapping_add(masked[i].data1).wrapping_add(received[i]);
        let local = match &key.dpf {
            Some(dpf) => {
                let dpf_eval = DpfEvaluator::new(key.params.dpf_params());
                dpf_eval.evaluate_at(dpf, m).with_context(|| format!("@{}:{}", file!(), line!()))?
            }
            None => 0,
        };
        locals.push(local);
    }

    let mut z0s = Vec::with_capacity(keys.len());
    for &local in &locals {
        let mask = corr.next_binary_zero().with_context(|| format!("@{}:{}", file!(), line!()))?;
        z0s.push(local ^ mask);
    }
    write_vec_u64(next_link, &z0s).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z1s = read_vec_u64(prev_link).with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(z0s.into_iter().zip(z1s).map(|(z0, z1)| RepShare::new(z0, z1)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::StreamChannel;
    use crate::sharing::binary_3p as bin3p;
    use rand::{rngs::StdRng, SeedableRng};
    use std::io::{BufReader, BufWriter};
    use std::os::unix::net::UnixStream;

    fn three_party_ring() -> Vec<(StreamChannel<UnixStream, UnixStream>, StreamChannel<UnixStream, UnixStream>)> {
        let (a0, a1) = UnixStream::pair().unwrap();
        let (b1, b2) = UnixStream::pair().unwrap();
        let (c2, c0) = UnixStream::pair().unwrap();
        let mk = |s: UnixStream| StreamChannel::new(BufReader::new(s.try_clone().unwrap()), BufWriter::new(s));
        vec![(mk(c0), mk(a0)), (mk(a1), mk(b1)), (mk(b2), mk(c2))]
    }

    fn run(x_val: u64, n: u32) -> u64 {
        let mut rng = StdRng::seed_from_u64(99 + x_val);
        let generator = ZeroTestKeyGenerator::new(ZeroTestParameters::new(n));
        let keys = generator.generate_keys(&mut rng).unwrap();
        let x_shares = bin3p::share_local(x_val, rng.next_u64(), rng.next_u64());

        let mut ring = three_party_ring();
        let keys_arr = keys.clone();
        let handles: Vec<_> = (1..3)
            .map(|me| {
                let key = keys_arr[me].clone();
                let x_share = x_shares[me];
                let (mut prev_link, mut next_link) = ring.remove(1);
                let seeds = [[1u8; 16], [2u8; 16], [3u8; 16]];
                let mut corr = CorrelatedRandomness::new(seeds[me], seeds[(me + 2) % 3], 16);
                std::thread::spawn(move || evaluate(&key, x_share, &mut corr, &mut prev_link, &mut next_link).unwrap())
            })
            .collect();

        let (mut prev0, mut next0) = ring.remove(0);
        let seeds = [[1u8; 16], [2u8; 16], [3u8; 16]];
        let mut corr0 = CorrelatedRandomness::new(seeds[0], seeds[2], 16);
        let r0 = evaluate(&keys_arr[0], x_shares[0], &mut corr0, &mut prev0, &mut next0).unwrap();
        let r1 = handles[0].join().unwrap();
        let r2 = handles[1].join().unwrap();

        r0.data0 ^ r1.data0 ^ r2.data0
    }

    #[test]
    fn zero_input_tests_true() {
        assert_eq!(run(0, 10), 1);
    }

    #[test]
    fn nonzero_input_tests_false() {
        assert_eq!(run(5, 10), 0);
    }

    #[test]
    fn zero_test_at_full_width() {
        assert_eq!(run(0, 10), 1);
        assert_eq!(run(1023, 10), 0);
    }

    fn run_arithmetic(x_val: u64, n: u32) -> u64 {
        let mut rng = StdRng::seed_from_u64(199 + x_val);
        let keys = generate_keys_arithmetic(ZeroTestParameters::new(n), &mut rng).unwrap();
        let x_shares = crate::sharing::arithmetic_3p::share_local(x_val, rng.next_u64(), rng.next_u64());

        let mut ring = three_party_ring();
        let keys_arr = keys.clone();
        let handles: Vec<_> = (1..3)
            .map(|me| {
                let key = keys_arr[me].clone();
                let x_share = x_shares[me];
                let (mut prev_link, mut next_link) = ring.remove(1);
                let seeds = [[1u8; 16], [2u8; 16], [3u8; 16]];
                let mut corr = CorrelatedRandomness::new(seeds[me], seeds[(me + 2) % 3], 16);
                std::thread::spawn(move || {
                    evaluate_arithmetic_batch(std::slice::from_ref(&key), std::slice::from_ref(&x_share), &mut corr, &mut prev_link, &mut next_link)
                        .unwrap()
                        .pop()
                        .unwrap()
                })
            })
            .collect();

        let (mut prev0, mut next0) = ring.remove(0);
        let seeds = [[1u8; 16], [2u8; 16], [3u8; 16]];
        let mut corr0 = CorrelatedRandomness::new(seeds[0], seeds[2], 16);
        let r0 = evaluate_arithmetic_batch(std::slice::from_ref(&keys_arr[0]), std::slice::from_ref(&x_shares[0]), &mut corr0, &mut prev0, &mut next0)
            .unwrap()
            .pop()
            .unwrap();
        let r1 = handles[0].join().unwrap();
        let r2 = handles[1].join().unwrap();

        r0.data0 ^ r1.data0 ^ r2.data0
    }

    #[test]
    fn arithmetic_zero_test_detects_equal_difference() {
        assert_eq!(run_arithmetic(0, 10), 1);
        assert_eq!(run_arithmetic(3, 10), 0);
    }

    #[test]
    fn key_round_trips_through_the_wire_format_for_both_dpf_holders_and_the_bystander() {
        let mut rng = StdRng::seed_from_u64(21);
        let generator = ZeroTestKeyGenerator::new(ZeroTestParameters::new(6));
        let keys = generator.generate_keys(&mut rng).unwrap();
        for key in &keys {
            let bytes = key.to_wire();
            let restored = ZeroTestKey::from_wire(&bytes).unwrap();
            assert_eq!(restored.to_wire(), bytes);
        }
    }
}

//! FssFMI: secure longest-prefix match against a BWT, built from two
//! parallel [`crate::wm::fsswm`] walkers tracking the matching interval's
//! endpoints.
//!
//! Grounded on `original_source/FssWM/wm/fmindex.cpp`'s backward-search
//! loop, translated into the two-walker `(f, g)` form the distilled
//! specification describes: `f` and `g` track the left and right ends of
//! the suffix-array interval, and the interval collapses to empty
//! exactly when `f = g`.

use anyhow::{Context, Result};
use rand::RngCore;

use crate::channel_utils::RawChannel;
use crate::sharing::arithmetic_3p;
use crate::sharing::correlated_randomness::CorrelatedRandomness;
use crate::sharing::share_types::RepShare;
use crate::wire::{put_len_prefixed, put_u64, Cursor, WireCodec};
use crate::wm::fsswm::{self, FssWMKey, FssWMKeyGenerator, FssWMParameters, RankTableRow};
use crate::wm::zero_test::{self, ZeroTestKey, ZeroTestParameters};

/// Parameter envelope: `d` is the bitwidth of interval positions (table
/// rows have `2^d` entries), `query_len` is the fixed number of symbols
/// `Q` every query has, `sigma` is the alphabet size fed to the
/// underlying [`FssWMParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FssFMIParameters {
    d: u32,
    query_len: usize,
    sigma: u32,
}

impl FssFMIParameters {
    /// Build the envelope for `Q`-symbol queries over a `2^d`-row table
    /// and a `sigma`-symbol alphabet.
    pub fn new(d: u32, query_len: usize, sigma: u32) -> Self {
        FssFMIParameters { d, query_len, sigma }
    }

    /// Query length `Q`.
    pub fn query_len(&self) -> usize {
        self.query_len
    }

    /// Row length every wavelet-matrix level's rank-0 table must be
    /// padded to, `2^d`.
    pub fn domain_size(&self) -> usize {
        1usize << self.d
    }

    fn wm_params(&self) -> FssWMParameters {
        FssWMParameters::new(self.d, self.sigma)
    }

    fn zero_test_params(&self) -> ZeroTestParameters {
        ZeroTestParameters::new(self.d)
    }
}

/// One party's key material for one fixed-length LPM query: one walker
/// key per query position, shared by both the `f` and `g` walkers (see
/// [`fsswm::evaluate_joint`]), a zero-test key per query position, and
/// whether this party is the one that injects the initial `g = text_len`
/// offset (an additive public constant, not a secret share; see
/// DESIGN.md).
#[derive(Debug, Clone)]
pub struct FssFMIKey {
    params: FssFMIParameters,
    walk: Vec<FssWMKey>,
    diff_tests: Vec<ZeroTestKey>,
    holds_initial_offset: bool,
}

impl FssFMIKey {
    /// Row length this key's wavelet-matrix tables must be padded to.
    pub fn domain_size(&self) -> usize {
        self.params.domain_size()
    }

    /// Whether this party injects the public `g = text_len` offset (see
    /// [`evaluate`]); exposed so a caller building `g`'s initial share
    /// outside of `evaluate` can match the same convention.
    pub fn holds_initial_offset(&self) -> bool {
        self.holds_initial_offset
    }
}

/// Generates [`FssFMIKey`]s for a fixed [`FssFMIParameters`] envelope.
pub struct FssFMIKeyGenerator {
    params: FssFMIParameters,
}

impl FssFMIKeyGenerator {
    /// Build a generator for `params`.
    pub fn new(params: FssFMIParameters) -> Self {
        FssFMIKeyGenerator { params }
    }

    /// Generate the three parties' keys for one fresh `Q`-symbol query.
    /// Party 0 is the one that carries the initial `g = text_len`
    /// injection (see [`evaluate`]).
    pub fn generate_keys<R: RngCore>(&self, rng: &mut R) -> Result<[FssFMIKey; 3]> {
        let wm_gen = FssWMKeyGenerator::new(self.params.wm_params());
        let mut walk_per_pos = Vec::with_capacity(self.params.query_len);
        let mut diff_per_pos = Vec::with_capacity(self.params.query_len);
        for _ in 0..self.params.query_len {
            walk_per_pos.push(wm_gen.generate_keys(rng).with_context(|| format!("@{}:{}", file!(), line!()))?);
            diff_per_pos.push(
                zero_test::generate_keys_arithmetic(self.params.zero_test_params(), rng)
                    .with_context(|| format!("@{}:{}", file!(), line!()))?,
            );
        }

        let mut walk: [Vec<FssWMKey>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        let mut diff_tests: [Vec<ZeroTestKey>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for pos_keys in walk_per_pos {
            for (me, k) in pos_keys.into_iter().enumerate() {
                walk[me].push(k);
            }
        }
        for pos_keys in diff_per_pos {
            for (me, k) in pos_keys.into_iter().enumerate() {
                diff_tests[me].push(k);
            }
        }

        let [w0, w1, w2] = walk;
        let [dt0, dt1, dt2] = diff_tests;
        Ok([
            FssFMIKey { params: self.params, walk: w0, diff_tests: dt0, holds_initial_offset: true },
            FssFMIKey { params: self.params, walk: w1, diff_tests: dt1, holds_initial_offset: false },
            FssFMIKey { params: self.params, walk: w2, diff_tests: dt2, holds_initial_offset: false },
        ])
    }
}

impl WireCodec for FssFMIKey {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, self.params.d as u64);
        put_u64(&mut buf, self.params.query_len as u64);
        put_u64(&mut buf, self.params.sigma as u64);
        put_u64(&mut buf, self.holds_initial_offset as u64);
        put_u64(&mut buf, self.walk.len() as u64);
        for k in &self.walk {
            put_len_prefixed(&mut buf, &k.to_wire());
        }
        for k in &self.diff_tests {
            put_len_prefixed(&mut buf, &k.to_wire());
        }
        buf
    }

    fn from_wire(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let d = cursor.get_u64()? as u32;
        let query_len = cursor.get_u64()? as usize;
        let sigma = cursor.get_u64()? as u32;
        let params = FssFMIParameters::new(d, query_len, sigma);
        let holds_initial_offset = cursor.get_u64()? != 0;
        let q = cursor.get_u64()? as usize;

        let mut walk = Vec::with_capacity(q);
        for _ in 0..q {
            walk.push(FssWMKey::from_wire(cursor.get_len_prefixed()?)?);
        }
        let mut diff_tests = Vec::with_capacity(q);
        for _ in 0..q {
            diff_tests.push(ZeroTestKey::from_wire(cursor.get_len_prefixed()?)?);
        }
        anyhow::ensure!(cursor.remaining() == 0, "trailing bytes in FssFMIKey wire data");

        Ok(FssFMIKey { params, walk, diff_tests, holds_initial_offset })
    }
}

/// Static rank-0 table data for every wavelet-matrix level, shared by
/// both the `f` and `g` walkers (the underlying BWT never changes across
/// a query).
pub struct RankTables {
    own: Vec<Vec<u64>>,
    prev: Vec<Vec<u64>>,
}

impl RankTables {
    /// Build the table set from this party's per-level `own`/`prev`
    /// replicated slots.
    pub fn new(own: Vec<Vec<u64>>, prev: Vec<Vec<u64>>) -> Self {
        debug_assert_eq!(own.len(), prev.len());
        RankTables { own, prev }
    }

    fn rows(&self) -> Vec<RankTableRow> {
        self.own.iter().zip(&self.prev).map(|(own, prev)| RankTableRow { own, prev }).collect()
    }

    /// Unwrap into the raw per-level `(own, prev)` row vectors, e.g. to
    /// pad them to a domain size before rebuilding with [`RankTables::new`].
    pub fn into_rows(self) -> (Vec<Vec<u64>>, Vec<Vec<u64>>) {
        (self.own, self.prev)
    }
}

/// Run one full `Q`-character longest-prefix-match query: advance both
/// walkers character by character, then batch-test every position's
/// `f - g` difference for zero in a single combined round. Returns a
/// length-`Q` vector of replicated shares, where entry `i` is `1` if the
/// interval had already collapsed by prefix length `i + 1`.
pub fn evaluate<C: RawChannel>(
    key: &FssFMIKey,
    text_len: u64,
    query_char_bits: &[Vec<RepShare>],
    tables: &RankTables,
    corr: &mut CorrelatedRandomness,
    prev_link: &mut C,
    next_link: &mut C,
) -> Result<Vec<RepShare>> {
    let q = key.params.query_len();
    debug_assert_eq!(query_char_bits.len(), q);
    debug_assert_eq!(key.walk.len(), q);
    debug_assert_eq!(key.diff_tests.len(), q);

    let mut f_sh = RepShare::new(0, 0);
    let mut g_sh = arithmetic_3p::add_public(RepShare::new(0, 0), text_len, key.holds_initial_offset);

    let rows = tables.rows();
    let mut diffs = Vec::with_capacity(q);
    for i in 0..q {
        let (next_f, next_g) = fsswm::evaluate_joint(&key.walk[i], f_sh, g_sh, &query_char_bits[i], &rows, corr, prev_link, next_link)
            .with_context(|| format!("@{}:{} query position {i}", file!(), line!()))?;
        f_sh = next_f;
        g_sh = next_g;
        diffs.push(arithmetic_3p::sub(f_sh, g_sh));
    }

    zero_test::evaluate_arithmetic_batch(&key.diff_tests, &diffs, corr, prev_link, next_link)
        .with_context(|| format!("@{}:{}", file!(), line!()))
}

/// Reconstruct a longest-prefix-match length from an opened `result`
/// vector (as returned by [`evaluate`] after each share has been
/// publicly opened): the count of leading zero entries, since a `1`
/// marks the position the interval first collapsed.
pub fn lpm_length_from_opened(result: &[u64]) -> usize {
    result.iter().take_while(|&&bit| bit == 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::StreamChannel;
    use crate::wm::plain_fm_index::{bits_for_sigma, PlainFmIndex};
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

    fn dna_symbols(s: &str) -> Vec<u32> {
        s.bytes()
            .map(|b| match b {
                b'A' => 0,
                b'C' => 1,
                b'G' => 2,
                b'T' => 3,
                _ => panic!("not a DNA symbol: {b}"),
            })
            .collect()
    }

    #[test]
    fn lpm_result_matches_the_plaintext_oracle_on_gattaca() {
        let text = dna_symbols("GATTACA");
        let sigma = 5u32;
        let index = PlainFmIndex::build(&text, sigma);
        let pattern = dna_symbols("GATTG");
        let expected_len = index.longest_prefix_match(&pattern);
        assert_eq!(expected_len, 4);

        // Drive the same backward search through plain rank_cf calls to
        // get the expected f/g endpoints at every step, matching what
        // the secure walk is meant to reproduce share-by-share.
        let bits = bits_for_sigma(sigma) as usize;
        let d = 3u32; // domain 0..8 comfortably covers len=7+1=8
        let domain = 1usize << d;
        let text_len = index.len() as u64;

        let mut expected_f = 0u64;
        let mut expected_g = text_len;
        let mut expected_bits: Vec<u64> = Vec::new();
        for &c in pattern.iter().rev() {
            expected_f = index.rank_cf(c, expected_f);
            expected_g = index.rank_cf(c, expected_g);
            expected_bits.push(if expected_f == expected_g { 1 } else { 0 });
        }

        let params = FssFMIParameters::new(d, pattern.len(), sigma);
        let mut rng = StdRng::seed_from_u64(123);
        let generator = FssFMIKeyGenerator::new(params);
        let keys = generator.generate_keys(&mut rng).unwrap();

        // Build the per-level rank tables (all weight on slot 0, as in
        // the fsswm unit test), padded to the chosen domain.
        let mut tables_own = Vec::with_capacity(bits);
        let mut tables_prev = Vec::with_capacity(bits);
        for lvl in 0..bits {
            let mut row = index.rank0_table(lvl).to_vec();
            row.resize(domain, *row.last().unwrap());
            tables_own.push(row);
            tables_prev.push(vec![0u64; domain]);
        }

        let query_char_bits: Vec<Vec<RepShare>> = pattern
            .iter()
            .rev()
            .map(|&c| (0..bits).map(|lvl| ((c >> (bits - 1 - lvl)) & 1) as u64).collect::<Vec<u64>>())
            .collect();

        let mut qcb_shares: Vec<Vec<[RepShare; 3]>> = Vec::with_capacity(pattern.len());
        for bits_for_char in &query_char_bits {
            qcb_shares.push(bits_for_char.iter().map(|&b| arithmetic_3p::share_local(b, rng.next_u64(), rng.next_u64())).collect());
        }

        let mut ring = three_party_ring();
        let keys_arr = keys.clone();
        let tables_own_arr = tables_own.clone();
        let tables_prev_arr = tables_prev.clone();
        let qcb_arr = qcb_shares.clone();

        let handles: Vec<_> = (1..3)
            .map(|me| {
                let key = keys_arr[me].clone();
                let rows_own: Vec<Vec<u64>> = if me == 0 { tables_own_arr.clone() } else { tables_own_arr.iter().map(|r| vec![0u64; r.len()]).collect() };
                let rows_prev: Vec<Vec<u64>> = if me == 0 { tables_prev_arr.clone() } else { tables_prev_arr.iter().map(|r| vec![0u64; r.len()]).collect() };
                let char_bits: Vec<Vec<RepShare>> = qcb_arr.iter().map(|cb| cb.iter().map(|s| s[me]).collect()).collect();
                let (mut prev_link, mut next_link) = ring.remove(1);
                let seeds = [[1u8; 16], [2u8; 16], [3u8; 16]];
                let mut corr = CorrelatedRandomness::new(seeds[me], seeds[(me + 2) % 3], 512);
                std::thread::spawn(move || {
                    let tables = RankTables::new(rows_own, rows_prev);
                    evaluate(&key, text_len, &char_bits, &tables, &mut corr, &mut prev_link, &mut next_link).unwrap()
                })
            })
            .collect();

        let (mut prev0, mut next0) = ring.remove(0);
        let seeds = [[1u8; 16], [2u8; 16], [3u8; 16]];
        let mut corr0 = CorrelatedRandomness::new(seeds[0], seeds[2], 512);
        let char_bits0: Vec<Vec<RepShare>> = qcb_shares.iter().map(|cb| cb.iter().map(|s| s[0]).collect()).collect();
        let tables0 = RankTables::new(tables_own, tables_prev);
        let r0 = evaluate(&keys_arr[0], text_len, &char_bits0, &tables0, &mut corr0, &mut prev0, &mut next0).unwrap();
        let r1 = handles[0].join().unwrap();
        let r2 = handles[1].join().unwrap();

        let opened: Vec<u64> = r0.iter().zip(&r1).zip(&r2).map(|((a, b), c)| a.data0 ^ b.data0 ^ c.data0).collect();
        assert_eq!(opened, expected_bits);
        assert_eq!(lpm_length_from_opened(&opened), expected_len);
    }

    #[test]
    fn key_round_trips_through_the_wire_format() {
        let mut rng = StdRng::seed_from_u64(41);
        let generator = FssFMIKeyGenerator::new(FssFMIParameters::new(3, 2, 5));
        let keys = generator.generate_keys(&mut rng).unwrap();

        let bytes = keys[0].to_wire();
        let restored = FssFMIKey::from_wire(&bytes).unwrap();
        assert_eq!(restored.to_wire(), bytes);
    }
}

//! Plaintext reference FM-index (BWT + wavelet matrix + rank-CF walk).
//!
//! Grounded on `original_source/FssWM/wm/plain_wm.cpp` and
//! `original_source/FssWM/wm/fmindex.cpp`: this is test-only ground truth
//! against which [`crate::wm::fsswm`] and `crate::fm_index`'s secure walks
//! are checked. Never used on the cryptographic hot path.

/// Number of bits needed to represent an alphabet of size `sigma`.
pub fn bits_for_sigma(sigma: u32) -> u32 {
    debug_assert!(sigma >= 2);
    (u32::BITS - (sigma - 1).leading_zeros()).max(1)
}

/// One level of the wavelet matrix: the stable bit-partition over the
/// reordering this level sees, plus its rank-0 prefix-count table
/// (`table[p]` = zero-bits in `[0, p)`, `table[len]` = total zero count).
#[derive(Debug, Clone)]
struct Level {
    bits: Vec<bool>,
    rank0_table: Vec<u64>,
}

impl Level {
    fn build(symbols: &[u32], bit_index: u32) -> (Self, Vec<u32>) {
        let bits: Vec<bool> = symbols.iter().map(|&s| (s >> bit_index) & 1 == 1).collect();
        let mut rank0_table = Vec::with_capacity(bits.len() + 1);
        rank0_table.push(0);
        let mut zeros = 0u64;
        for &b in &bits {
            if !b {
                zeros += 1;
            }
            rank0_table.push(zeros);
        }

        let mut reordered = Vec::with_capacity(symbols.len());
        reordered.extend(symbols.iter().zip(&bits).filter(|(_, b)| !**b).map(|(s, _)| *s));
        reordered.extend(symbols.iter().zip(&bits).filter(|(_, b)| **b).map(|(s, _)| *s));

        (Level { bits, rank0_table }, reordered)
    }

    fn rank0(&self, p: u64) -> u64 {
        self.rank0_table[p as usize]
    }

    fn total_zeros(&self) -> u64 {
        *self.rank0_table.last().unwrap()
    }
}

/// A plaintext wavelet matrix over an alphabet of `sigma` symbols,
/// most-significant-bit first.
#[derive(Debug, Clone)]
pub struct PlainWaveletMatrix {
    sigma: u32,
    levels: Vec<Level>,
}

impl PlainWaveletMatrix {
    /// Build the wavelet matrix over `symbols`, each `< sigma`.
    pub fn build(symbols: &[u32], sigma: u32) -> Self {
        let bits = bits_for_sigma(sigma);
        let mut levels = Vec::with_capacity(bits as usize);
        let mut current = symbols.to_vec();
        for level_bit in (0..bits).rev() {
            let (level, next) = Level::build(&current, level_bit);
            levels.push(level);
            current = next;
        }
        PlainWaveletMatrix { sigma, levels }
    }

    /// Number of levels (bits) in the matrix.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// The rank-0 table for level `i`, `len(text) + 1` entries.
    pub fn rank0_table(&self, i: usize) -> &[u64] {
        &self.levels[i].rank0_table
    }

    /// One step of the rank-CF walk at level `i`: given the current
    /// position `p` and bit `bit` of the queried symbol at this level,
    /// returns the position in the next level's reordering.
    pub fn rank_cf_step(&self, i: usize, p: u64, bit: bool) -> u64 {
        let level = &self.levels[i];
        let rank0 = level.rank0(p);
        if bit {
            (p - rank0) + level.total_zeros()
        } else {
            rank0
        }
    }

    /// Walk all levels for symbol `c` (`< sigma`) starting from position
    /// `p`, returning the final position in the bottom-level reordering.
    pub fn rank_cf(&self, c: u32, mut p: u64) -> u64 {
        let bits = bits_for_sigma(self.sigma);
        for level_bit in (0..bits).rev() {
            let i = (bits - 1 - level_bit) as usize;
            let bit = (c >> level_bit) & 1 == 1;
            p = self.rank_cf_step(i, p, bit);
        }
        p
    }
}

/// A plaintext BWT + wavelet-matrix FM-index, built over a symbol
/// alphabet of size `sigma` with the last symbol reserved as the unique
/// end-of-text sentinel (matching the source's `$`-terminated BWT
/// convention).
#[derive(Debug, Clone)]
pub struct PlainFmIndex {
    sigma: u32,
    bwt: Vec<u32>,
    wm: PlainWaveletMatrix,
    /// Number of suffixes lexicographically smaller than each symbol,
    /// i.e. the `C[]` array of a classic FM-index.
    c_array: Vec<u64>,
}

impl PlainFmIndex {
    /// Build the index over `text` (symbols `< sigma - 1`; the sentinel
    /// `sigma - 1` is appended automatically and must not already occur).
    pub fn build(text: &[u32], sigma: u32) -> Self {
        let sentinel = sigma - 1;
        debug_assert!(text.iter().all(|&s| s < sentinel));
        let mut padded = text.to_vec();
        padded.push(sentinel);
        let n = padded.len();

        let mut suffix_order: Vec<usize> = (0..n).collect();
        suffix_order.sort_by(|&a, &b| padded[a..].cmp(&padded[b..]));

        let bwt: Vec<u32> = suffix_order.iter().map(|&i| padded[(i + n - 1) % n]).collect();

        let mut counts = vec![0u64; sigma as usize];
        for &s in &padded {
            counts[s as usize] += 1;
        }
        let mut c_array = vec![0u64; sigma as usize];
        for s in 1..sigma as usize {
            c_array[s] = c_array[s - 1] + counts[s - 1];
        }

        let wm = PlainWaveletMatrix::build(&bwt, sigma);

        PlainFmIndex { sigma, bwt, wm, c_array }
    }

    /// Length of the BWT (original text length plus the sentinel).
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    /// Whether the index covers the empty (sentinel-only) text.
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    /// The underlying wavelet matrix's rank-0 table for level `i`.
    pub fn rank0_table(&self, i: usize) -> &[u64] {
        self.wm.rank0_table(i)
    }

    /// Number of wavelet-matrix levels (bits of the alphabet).
    pub fn num_wm_levels(&self) -> usize {
        self.wm.num_levels()
    }

    /// The underlying wavelet matrix's rank-CF walk, with no `C[]`
    /// offset applied (unlike [`Self::backward_step`]).
    pub fn rank_cf(&self, c: u32, p: u64) -> u64 {
        self.wm.rank_cf(c, p)
    }

    /// Backward-search one character: narrow `[lo, hi)` to the
    /// sub-interval of suffixes prefixed by `c`.
    pub fn backward_step(&self, c: u32, lo: u64, hi: u64) -> (u64, u64) {
        let new_lo = self.c_array[c as usize] + self.wm.rank_cf(c, lo);
        let new_hi = self.c_array[c as usize] + self.wm.rank_cf(c, hi);
        (new_lo, new_hi)
    }

    /// Longest-prefix-match length of `pattern` against the indexed
    /// text: the number of leading characters of `pattern` for which
    /// `[lo, hi)` stays non-empty, searching back to front exactly as
    /// FM-index backward search does.
    pub fn longest_prefix_match(&self, pattern: &[u32]) -> usize {
        let mut lo = 0u64;
        let mut hi = self.bwt.len() as u64;
        let mut matched = 0usize;
        for &c in pattern.iter().rev() {
            let (new_lo, new_hi) = self.backward_step(c, lo, hi);
            if new_lo >= new_hi {
                break;
            }
            lo = new_lo;
            hi = new_hi;
            matched += 1;
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn rank0_table_is_monotone_nondecreasing() {
        let symbols = dna_symbols("ACACGT");
        let wm = PlainWaveletMatrix::build(&symbols, 5);
        for i in 0..wm.num_levels() {
            let table = wm.rank0_table(i);
            for w in table.windows(2) {
                assert!(w[1] >= w[0]);
            }
        }
    }

    #[test]
    fn rank_cf_on_dna_bwt_matches_manual_count() {
        // sigma=5: A=0,C=1,G=2,T=3,$=4 (3-bit wide alphabet per the
        // scenario's sigma=3-bit convention would need 5 symbols; use the
        // full DNA+sentinel alphabet directly here).
        let symbols = dna_symbols("ACACGT");
        let wm = PlainWaveletMatrix::build(&symbols, 5);
        // rank_cf(G, 5) should equal the position of the sole 'G' (at BWT
        // index 4) among G-symbols when restricted to [0, 5).
        let g_count_before_5 = symbols[..5].iter().filter(|&&s| s == 2).count() as u64;
        assert_eq!(wm.rank_cf(2, 5), g_count_before_5);
    }

    #[test]
    fn longest_prefix_match_finds_the_expected_length() {
        let text = dna_symbols("GATTACA");
        let sigma = 5; // A,C,G,T,$
        let index = PlainFmIndex::build(&text, sigma);
        let pattern = dna_symbols("GATTG");
        assert_eq!(index.longest_prefix_match(&pattern), 4);
    }

    #[test]
    fn exact_match_of_the_whole_text_succeeds() {
        let text = dna_symbols("ACACGT");
        let sigma = 5;
        let index = PlainFmIndex::build(&text, sigma);
        assert_eq!(index.longest_prefix_match(&text), text.len());
    }
}

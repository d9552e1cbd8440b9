//! Distributed Point Function: key generation and evaluation.
//!
//! Ported from the tree-descent algorithm described in
//! `original_source/FssWM/fss/dpf_key.h` / `dpf_gen.h` / `dpf_eval.h`. Those
//! headers document the public shape (`DpfParameters`, `DpfKey`,
//! `DpfKeyGenerator`, `DpfEvaluator`, the three `EvalType`s) but the
//! retrieval pack kept only the headers, not the `.cpp` bodies — the exact
//! bit-level tree-descent formulas below are this crate's own
//! implementation of the standard Boyle-Gilboa-Ishai DPF construction,
//! adapted to two output groups. See DESIGN.md for why `ShiftedAdditive`
//! forgoes early termination (`nu = 0`) while `SingleBitMask` keeps it
//! (`nu = 7`): an arithmetic leaf can't be packed 128-to-a-block without a
//! per-slot correction that the fixed 16-byte key field can't hold, while a
//! single-bit leaf can.

use std::fmt;

use rand::RngCore;

use crate::errors::FssWmError;

use super::block::Block;
use super::prg::Prg;

/// Which full-domain evaluation algorithm to use. `Naive` and `Recursion`
/// exist to cross-check `IterSingleBatch` in tests and benchmarks; they are
/// never on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EvalType {
    /// Sequential per-leaf tree walk. O(leaves * depth) PRG calls.
    Naive,
    /// Same cost as `Naive`, structured as a recursive tree descent instead
    /// of a flat loop.
    Recursion,
    /// Iterative breadth-first descent with a two-buffer scheme and
    /// batched (up to 16-wide) PRG expansion per level. Canonical choice.
    IterSingleBatch,
}

impl fmt::Display for EvalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalType::Naive => write!(f, "naive"),
            EvalType::Recursion => write!(f, "recursion"),
            EvalType::IterSingleBatch => write!(f, "iter_single_batch"),
        }
    }
}

/// The canonical (fastest) evaluation type, used when a caller doesn't
/// otherwise care.
pub const OPTIMIZED_EVAL_TYPE: EvalType = EvalType::IterSingleBatch;

/// Which group the DPF's leaf correction lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputMode {
    /// Leaf is a `u64` arithmetic value mod 2^64; reconstruction is
    /// `eval(k0, x).wrapping_add(eval(k1, x))`. Party 1's leaf is internally
    /// negated so the two shares cancel off the special point instead of
    /// doubling. No early termination (`nu = 0`): each tree leaf covers
    /// exactly one domain point.
    ShiftedAdditive,
    /// Leaf is a 128-bit packed bitmask; reconstruction is
    /// `eval(k0, x) ^ eval(k1, x)`. Early termination packs `2^nu` domain
    /// points (one bit each) into a single tree leaf.
    SingleBitMask,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::ShiftedAdditive => write!(f, "shifted_additive"),
            OutputMode::SingleBitMask => write!(f, "single_bit_mask"),
        }
    }
}

/// Parameters shared out-of-band by the dealer and every party: input
/// bitsize `n`, output bitsize `e`, the evaluation algorithm, and the
/// output group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpfParameters {
    input_bitsize: u32,
    output_bitsize: u32,
    eval_type: EvalType,
    output_mode: OutputMode,
}

impl DpfParameters {
    /// Build and validate a parameter envelope. `n` must be in `1..=64`
    /// and `e` must be `<= 64` (the crate represents every scalar output as
    /// a `u64`).
    pub fn new(n: u32, e: u32, eval_type: EvalType, output_mode: OutputMode) -> Result<Self, FssWmError> {
        if n == 0 || n > 64 {
            return Err(FssWmError::parameter_invalid(format!(
                "input bitsize n={n} must be in 1..=64"
            )));
        }
        if e > 64 {
            return Err(FssWmError::parameter_invalid(format!(
                "output bitsize e={e} must be <= 64"
            )));
        }
        Ok(DpfParameters {
            input_bitsize: n,
            output_bitsize: e,
            eval_type,
            output_mode,
        })
    }

    /// Input bitsize `n`.
    pub fn input_bitsize(&self) -> u32 {
        self.input_bitsize
    }

    /// Output bitsize `e`.
    pub fn output_bitsize(&self) -> u32 {
        self.output_bitsize
    }

    /// The configured evaluation algorithm.
    pub fn eval_type(&self) -> EvalType {
        self.eval_type
    }

    /// The configured output group.
    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// The early-termination bitsize: `7` for `SingleBitMask` when `n >=
    /// 8` (so `2^nu` bits fit exactly one `Block`), `n` itself when `n <
    /// 8`, and `0` for `ShiftedAdditive` (see the module doc for why).
    pub fn nu(&self) -> u32 {
        match self.output_mode {
            OutputMode::SingleBitMask => {
                if self.input_bitsize >= 8 {
                    7
                } else {
                    self.input_bitsize
                }
            }
            OutputMode::ShiftedAdditive => 0,
        }
    }

    /// Tree-descent depth, `ell = n - nu`. This is exactly the number of
    /// correction-word triples a [`DpfKey`] carries.
    pub fn ell(&self) -> u32 {
        self.input_bitsize - self.nu()
    }

    fn validate_alpha(&self, alpha: u64) -> Result<(), FssWmError> {
        if self.input_bitsize < 64 && alpha >= (1u64 << self.input_bitsize) {
            return Err(FssWmError::parameter_invalid(format!(
                "alpha={alpha} out of range for n={}",
                self.input_bitsize
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DpfParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DpfParameters(n={}, e={}, eval_type={}, output_mode={}, nu={})",
            self.input_bitsize,
            self.output_bitsize,
            self.eval_type,
            self.output_mode,
            self.nu()
        )
    }
}

/// One party's half of a DPF keypair.
///
/// Field order matches the wire format of §6.2: `party_id (8B) | init_seed
/// (16B) | cw_length (8B) | cw_seed[] (16B each) | cw_ctrl_left[] (1B each)
/// | cw_ctrl_right[] (1B each) | output (16B)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpfKey {
    party_id: u64,
    init_seed: Block,
    cw_seed: Vec<Block>,
    cw_ctrl_left: Vec<bool>,
    cw_ctrl_right: Vec<bool>,
    output: Block,
}

impl DpfKey {
    /// The size in bytes this key serializes to.
    pub fn calculate_serialized_size(&self) -> usize {
        let cw_len = self.cw_seed.len();
        8 + 16 + 8 + cw_len * 16 + cw_len + cw_len + 16
    }

    /// Pack the key into its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.calculate_serialized_size());
        buf.extend_from_slice(&self.party_id.to_le_bytes());
        buf.extend_from_slice(&self.init_seed.to_bytes());
        buf.extend_from_slice(&(self.cw_seed.len() as u64).to_le_bytes());
        for s in &self.cw_seed {
            buf.extend_from_slice(&s.to_bytes());
        }
        for &b in &self.cw_ctrl_left {
            buf.push(b as u8);
        }
        for &b in &self.cw_ctrl_right {
            buf.push(b as u8);
        }
        buf.extend_from_slice(&self.output.to_bytes());
        buf
    }

    /// Inverse of [`DpfKey::serialize`]. Validates the self-consistency
    /// check mandated by §6.2 (actual length must equal the computed
    /// `calculate_serialized_size`).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, FssWmError> {
        if bytes.len() < 8 + 16 + 8 {
            return Err(FssWmError::SerializationLengthMismatch {
                expected: 8 + 16 + 8,
                actual: bytes.len(),
            });
        }
        let mut off = 0usize;
        let party_id = u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap());
        off += 8;
        let init_seed = Block::from_bytes(bytes[off..off + 16].try_into().unwrap());
        off += 16;
        let cw_len = u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap()) as usize;
        off += 8;

        let expected_total = 8 + 16 + 8 + cw_len * 16 + cw_len + cw_len + 16;
        if bytes.len() != expected_total {
            return Err(FssWmError::SerializationLengthMismatch {
                expected: expected_total,
                actual: bytes.len(),
            });
        }

        let mut cw_seed = Vec::with_capacity(cw_len);
        for _ in 0..cw_len {
            cw_seed.push(Block::from_bytes(bytes[off..off + 16].try_into().unwrap()));
            off += 16;
        }
        let mut cw_ctrl_left = Vec::with_capacity(cw_len);
        for _ in 0..cw_len {
            cw_ctrl_left.push(bytes[off] != 0);
            off += 1;
        }
        let mut cw_ctrl_right = Vec::with_capacity(cw_len);
        for _ in 0..cw_len {
            cw_ctrl_right.push(bytes[off] != 0);
            off += 1;
        }
        let output = Block::from_bytes(bytes[off..off + 16].try_into().unwrap());

        Ok(DpfKey {
            party_id,
            init_seed,
            cw_seed,
            cw_ctrl_left,
            cw_ctrl_right,
            output,
        })
    }
}

fn one_hot_block(pos: u32) -> Block {
    debug_assert!(pos < 128);
    if pos < 64 {
        Block::from_halves(1u64 << pos, 0)
    } else {
        Block::from_halves(0, 1u64 << (pos - 64))
    }
}

/// State carried down the tree during key generation or evaluation.
#[derive(Clone, Copy)]
struct TreeState {
    seed: Block,
    ctrl: bool,
}

/// Generates DPF keypairs for a fixed [`DpfParameters`] envelope.
pub struct DpfKeyGenerator {
    params: DpfParameters,
    prg: Prg,
}

impl DpfKeyGenerator {
    /// Build a key generator for `params`.
    pub fn new(params: DpfParameters) -> Self {
        DpfKeyGenerator { params, prg: Prg::new() }
    }

    /// Generate a keypair such that `eval(k0, x) combine eval(k1, x) =
    /// beta` at `x = alpha` and the group identity elsewhere (`combine` is
    /// XOR for `SingleBitMask`, wrapping addition for `ShiftedAdditive`).
    pub fn generate_keys<R: RngCore>(&self, alpha: u64, beta: u64, rng: &mut R) -> Result<(DpfKey, DpfKey), FssWmError> {
        self.params.validate_alpha(alpha)?;

        let mut root_bytes0 = [0u8; 16];
        let mut root_bytes1 = [0u8; 16];
        rng.fill_bytes(&mut root_bytes0);
        rng.fill_bytes(&mut root_bytes1);
        let mut state0 = TreeState { seed: Block::from_bytes(root_bytes0), ctrl: false };
        let mut state1 = TreeState { seed: Block::from_bytes(root_bytes1), ctrl: true };
        let init_seed0 = state0.seed;
        let init_seed1 = state1.seed;

        let ell = self.params.ell();
        let n = self.params.input_bitsize();
        let mut cw_seed = Vec::with_capacity(ell as usize);
        let mut cw_ctrl_left = Vec::with_capacity(ell as usize);
        let mut cw_ctrl_right = Vec::with_capacity(ell as usize);

        for level in 0..ell {
            let bit = ((alpha >> (n - 1 - level)) & 1) == 1;

            let (sl0, sr0, tl0, tr0) = self.prg.double_expand(state0.seed);
            let (sl1, sr1, tl1, tr1) = self.prg.double_expand(state1.seed);

            let seed_cw = if bit { sl0 ^ sl1 } else { sr0 ^ sr1 };
            let tcw_left = tl0 ^ tl1 ^ bit ^ true;
            let tcw_right = tr0 ^ tr1 ^ bit;

            let (keep0, keep_t0, keep1, keep_t1, keep_tcw) = if bit {
                (sr0, tr0, sr1, tr1, tcw_right)
            } else {
                (sl0, tl0, sl1, tl1, tcw_left)
            };

            let next_seed0 = if state0.ctrl { keep0 ^ seed_cw } else { keep0 };
            let next_seed1 = if state1.ctrl { keep1 ^ seed_cw } else { keep1 };
            let next_ctrl0 = if state0.ctrl { keep_t0 ^ keep_tcw } else { keep_t0 };
            let next_ctrl1 = if state1.ctrl { keep_t1 ^ keep_tcw } else { keep_t1 };

            cw_seed.push(seed_cw);
            cw_ctrl_left.push(tcw_left);
            cw_ctrl_right.push(tcw_right);

            state0 = TreeState { seed: next_seed0, ctrl: next_ctrl0 };
            state1 = TreeState { seed: next_seed1, ctrl: next_ctrl1 };
        }

        let output = match self.params.output_mode() {
            OutputMode::SingleBitMask => {
                let leaf0 = self.prg.expand(state0.seed, false);
                let leaf1 = self.prg.expand(state1.seed, false);
                let nu = self.params.nu();
                let pos = if nu == 0 { 0 } else { (alpha & ((1u64 << nu) - 1)) as u32 };
                leaf0 ^ leaf1 ^ one_hot_block(pos)
            }
            OutputMode::ShiftedAdditive => {
                let conv0 = self.prg.expand(state0.seed, false).half(0);
                let conv1 = self.prg.expand(state1.seed, false).half(0);
                // Party 1's leaf is negated at eval time (see `leaf_value`),
                // so reconstruction is conv0 - conv1 + (ctrl0 - ctrl1)*output.
                // Off the alpha path, ctrl0 == ctrl1 and conv0 == conv1, so
                // the two evals cancel regardless of `output`. On the alpha
                // path exactly one of ctrl0/ctrl1 is set; t0 XOR t1 == true
                // there, so (ctrl0 - ctrl1) is +-1 and its own inverse mod
                // 2^64.
                let sign_is_pos = state0.ctrl && !state1.ctrl;
                let raw = beta.wrapping_sub(conv0).wrapping_add(conv1);
                let scalar = if sign_is_pos { raw } else { raw.wrapping_neg() };
                Block::from_halves(scalar, 0)
            }
        };

        Ok((
            DpfKey {
                party_id: 0,
                init_seed: init_seed0,
                cw_seed: cw_seed.clone(),
                cw_ctrl_left: cw_ctrl_left.clone(),
                cw_ctrl_right: cw_ctrl_right.clone(),
                output,
            },
            DpfKey {
                party_id: 1,
                init_seed: init_seed1,
                cw_seed,
                cw_ctrl_left,
                cw_ctrl_right,
                output,
            },
        ))
    }
}

/// Evaluates DPF keys generated for a fixed [`DpfParameters`] envelope.
pub struct DpfEvaluator {
    params: DpfParameters,
    prg: Prg,
}

impl DpfEvaluator {
    /// Build an evaluator for `params`.
    pub fn new(params: DpfParameters) -> Self {
        DpfEvaluator { params, prg: Prg::new() }
    }

    fn validate_input(&self, x: u64) -> Result<(), FssWmError> {
        self.params.validate_alpha(x)
    }

    fn descend(&self, key: &DpfKey, x: u64) -> TreeState {
        let n = self.params.input_bitsize();
        let mut state = TreeState { seed: key.init_seed, ctrl: key.party_id == 1 };
        for level in 0..self.params.ell() {
            let bit = ((x >> (n - 1 - level)) & 1) == 1;
            let (sl, sr, tl, tr) = self.prg.double_expand(state.seed);
            let (mut next_seed, mut next_ctrl) = if bit { (sr, tr) } else { (sl, tl) };
            if state.ctrl {
                next_seed ^= key.cw_seed[level as usize];
                next_ctrl ^= if bit { key.cw_ctrl_right[level as usize] } else { key.cw_ctrl_left[level as usize] };
            }
            state = TreeState { seed: next_seed, ctrl: next_ctrl };
        }
        state
    }

    fn leaf_value(&self, key: &DpfKey, x: u64, state: TreeState) -> u64 {
        match self.params.output_mode() {
            OutputMode::SingleBitMask => {
                let mut leaf = self.prg.expand(state.seed, false);
                if state.ctrl {
                    leaf ^= key.output;
                }
                let nu = self.params.nu();
                let pos = if nu == 0 { 0 } else { (x & ((1u64 << nu) - 1)) as u32 };
                leaf.get_bit(pos as usize) as u64
            }
            OutputMode::ShiftedAdditive => {
                let conv = self.prg.expand(state.seed, false).half(0);
                let raw = if state.ctrl { conv.wrapping_add(key.output.half(0)) } else { conv };
                // Party 1's contribution is negated so the two additive
                // shares cancel off the alpha path instead of doubling.
                if key.party_id == 1 {
                    raw.wrapping_neg()
                } else {
                    raw
                }
            }
        }
    }

    /// Evaluate the key at a single point `x`, using the `eval_type`
    /// configured on `params`. `Naive` and `Recursion` compute the
    /// identical result via different code shapes; both exist for
    /// cross-checking `IterSingleBatch`'s full-domain path, which reuses
    /// this same per-point routine internally.
    pub fn evaluate_at(&self, key: &DpfKey, x: u64) -> Result<u64, FssWmError> {
        self.validate_input(x)?;
        match self.params.eval_type() {
            EvalType::Naive => Ok(self.leaf_value(key, x, self.descend(key, x))),
            EvalType::Recursion => Ok(self.evaluate_at_recursive(key, x, 0, TreeState { seed: key.init_seed, ctrl: key.party_id == 1 })),
            EvalType::IterSingleBatch => Ok(self.leaf_value(key, x, self.descend(key, x))),
        }
    }

    fn evaluate_at_recursive(&self, key: &DpfKey, x: u64, level: u32, state: TreeState) -> u64 {
        if level == self.params.ell() {
            return self.leaf_value(key, x, state);
        }
        let n = self.params.input_bitsize();
        let bit = ((x >> (n - 1 - level)) & 1) == 1;
        let (sl, sr, tl, tr) = self.prg.double_expand(state.seed);
        let (mut next_seed, mut next_ctrl) = if bit { (sr, tr) } else { (sl, tl) };
        if state.ctrl {
            next_seed ^= key.cw_seed[level as usize];
            next_ctrl ^= if bit { key.cw_ctrl_right[level as usize] } else { key.cw_ctrl_left[level as usize] };
        }
        self.evaluate_at_recursive(key, x, level + 1, TreeState { seed: next_seed, ctrl: next_ctrl })
    }

    /// Evaluate the key for every `x` in `[0, 2^n)` at once, returning one
    /// `Block` per tree leaf (`2^ell` of them). For `SingleBitMask`, each
    /// `Block` packs `2^nu` independent output bits — the common case
    /// (`nu = 7`) yields exactly `2^n / 128` blocks, matching §4.2/§8's
    /// full-domain sum invariant. For `ShiftedAdditive` (`nu = 0`), one
    /// leaf is one domain point, so this returns `2^n` blocks, each
    /// holding its scalar in `half(0)` (`half(1)` carries the leaf index,
    /// for the rare caller that wants it alongside the value).
    pub fn full_domain(&self, key: &DpfKey) -> Result<Vec<Block>, FssWmError> {
        match self.params.eval_type() {
            EvalType::Naive => Ok(self.full_domain_naive(key)),
            EvalType::Recursion => Ok(self.full_domain_recursion(key)),
            EvalType::IterSingleBatch => Ok(self.full_domain_iter_single_batch(key)),
        }
    }

    fn leaf_node_block(&self, key: &DpfKey, group_index: u64, state: TreeState) -> Block {
        match self.params.output_mode() {
            OutputMode::SingleBitMask => {
                let mut leaf = self.prg.expand(state.seed, false);
                if state.ctrl {
                    leaf ^= key.output;
                }
                leaf
            }
            OutputMode::ShiftedAdditive => {
                let conv = self.prg.expand(state.seed, false).half(0);
                let raw = if state.ctrl { conv.wrapping_add(key.output.half(0)) } else { conv };
                let value = if key.party_id == 1 { raw.wrapping_neg() } else { raw };
                Block::from_halves(value, group_index as u64)
            }
        }
    }

    fn full_domain_naive(&self, key: &DpfKey) -> Vec<Block> {
        let ell = self.params.ell();
        let n = self.params.input_bitsize();
        let groups = 1u64 << ell;
        let mut out = Vec::with_capacity(groups as usize);
        for g in 0..groups {
            // Representative x for this group: the group index shifted
            // into the top n-nu bits, low nu bits zero.
            let x = g << self.params.nu();
            let state = self.descend(key, x.min((1u64 << n) - 1));
            out.push(self.leaf_node_block(key, g, state));
        }
        out
    }

    fn full_domain_recursion(&self, key: &DpfKey) -> Vec<Block> {
        let mut out = Vec::with_capacity(1usize << self.params.ell());
        self.recurse_full_domain(key, 0, 0, TreeState { seed: key.init_seed, ctrl: key.party_id == 1 }, &mut out);
        out
    }

    fn recurse_full_domain(&self, key: &DpfKey, level: u32, group_index: u64, state: TreeState, out: &mut Vec<Block>) {
        if level == self.params.ell() {
            out.push(self.leaf_node_block(key, group_index, state));
            return;
        }
        let (sl, sr, tl, tr) = self.prg.double_expand(state.seed);
        let mut left = (sl, tl);
        let mut right = (sr, tr);
        if state.ctrl {
            left.0 ^= key.cw_seed[level as usize];
            left.1 ^= key.cw_ctrl_left[level as usize];
            right.0 ^= key.cw_seed[level as usize];
            right.1 ^= key.cw_ctrl_right[level as usize];
        }
        self.recurse_full_domain(key, level + 1, group_index << 1, TreeState { seed: left.0, ctrl: left.1 }, out);
        self.recurse_full_domain(key, level + 1, (group_index << 1) | 1, TreeState { seed: right.0, ctrl: right.1 }, out);
    }

    /// Iterative breadth-first descent: buffer A holds the current level's
    /// states, buffer B is filled via [`Prg::double_expand_batch`] in
    /// chunks of up to 16 at a time, then the buffers swap roles.
    fn full_domain_iter_single_batch(&self, key: &DpfKey) -> Vec<Block> {
        let ell = self.params.ell() as usize;
        let mut frontier: Vec<TreeState> = vec![TreeState { seed: key.init_seed, ctrl: key.party_id == 1 }];

        for level in 0..ell {
            let seeds: Vec<Block> = frontier.iter().map(|s| s.seed).collect();
            let mut next = Vec::with_capacity(frontier.len() * 2);
            for chunk_start in (0..seeds.len()).step_by(16) {
                let chunk_end = (chunk_start + 16).min(seeds.len());
                let expanded = self.prg.double_expand_batch(&seeds[chunk_start..chunk_end]);
                for (offset, (sl, sr, tl, tr)) in expanded.into_iter().enumerate() {
                    let state = frontier[chunk_start + offset];
                    let mut left = (sl, tl);
                    let mut right = (sr, tr);
                    if state.ctrl {
                        left.0 ^= key.cw_seed[level];
                        left.1 ^= key.cw_ctrl_left[level];
                        right.0 ^= key.cw_seed[level];
                        right.1 ^= key.cw_ctrl_right[level];
                    }
                    next.push(TreeState { seed: left.0, ctrl: left.1 });
                    next.push(TreeState { seed: right.0, ctrl: right.1 });
                }
            }
            frontier = next;
        }

        frontier
            .into_iter()
            .enumerate()
            .map(|(g, state)| self.leaf_node_block(key, g as u64, state))
            .collect()
    }
}

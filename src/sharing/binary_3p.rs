//! Binary-flavor (XOR-group) three-party replicated sharing.
//!
//! Grounded on `original_source/FssWM/sharing/binary_3p.h`
//! (`BinaryReplicatedSharing3P`). `open` and `and` are the only
//! interactive operations; `xor` and `select`'s inner XOR are local.

use anyhow::{Context, Result};

use crate::channel_utils::{read_u64, write_u64, RawChannel};
use crate::sharing::correlated_randomness::CorrelatedRandomness;
use crate::sharing::share_types::RepShare;

/// Create a binary replicated sharing of `x` at the dealer: returns the
/// three parties' shares in ring order (`shares[i]` is party `i`'s pair).
pub fn share_local(x: u64, r0: u64, r1: u64) -> [RepShare; 3] {
    let r2 = x ^ r0 ^ r1;
    [RepShare::new(r0, r2), RepShare::new(r1, r0), RepShare::new(r2, r1)]
}

/// Reconstruct a shared value: send `data0` to `prev`, receive the third
/// share from `next`, and XOR all three together.
pub fn open<C: RawChannel>(share: RepShare, prev: &mut C, next: &mut C) -> Result<u64> {
    write_u64(prev, share.data0).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let received = read_u64(next).with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(share.data0 ^ share.data1 ^ received)
}

/// Local componentwise XOR.
pub fn xor(x: RepShare, y: RepShare) -> RepShare {
    RepShare::new(x.data0 ^ y.data0, x.data1 ^ y.data1)
}

/// Bitwise AND, the protocol's one-round primitive: each party locally
/// computes its additive piece of the product, masks it with a
/// non-interactive zero-share, and exchanges the masked value with its
/// ring neighbors.
pub fn and<C: RawChannel>(
    x: RepShare,
    y: RepShare,
    corr: &mut CorrelatedRandomness,
    prev: &mut C,
    next: &mut C,
) -> Result<RepShare> {
    let local = (x.data0 & y.data0) ^ (x.data1 & y.data0) ^ (x.data0 & y.data1);
    let mask = corr.next_binary_zero().with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z0 = local ^ mask;

    write_u64(next, z0).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z1 = read_u64(prev).with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(RepShare::new(z0, z1))
}

/// `select(x, y, c) = x ^ (c & (x ^ y))`: the standard one-AND multiplexer.
pub fn select<C: RawChannel>(
    x: RepShare,
    y: RepShare,
    c: RepShare,
    corr: &mut CorrelatedRandomness,
    prev: &mut C,
    next: &mut C,
) -> Result<RepShare> {
    let diff = xor(x, y);
    let masked = and(c, diff, corr, prev, next).with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(xor(x, masked))
}

//! Arithmetic-flavor (mod `2^64`) three-party replicated sharing.
//!
//! Grounded on `original_source/FssWM/sharing/additive_3p.h`; mirrors
//! [`crate::sharing::binary_3p`] with `+`/`-`/`*` replacing XOR/AND
//! following the DN07-style local re-sharing DESIGN.md settles on for the
//! multiplication round.

use anyhow::{Context, Result};

use crate::channel_utils::{read_u64, write_u64, RawChannel};
use crate::sharing::correlated_randomness::CorrelatedRandomness;
use crate::sharing::share_types::RepShare;

/// Dealer-side share of `x`, mirroring [`crate::sharing::binary_3p::share_local`]
/// but with wrapping addition as the reconstruction group.
pub fn share_local(x: u64, r0: u64, r1: u64) -> [RepShare; 3] {
    let r2 = x.wrapping_sub(r0).wrapping_sub(r1);
    [RepShare::new(r0, r2), RepShare::new(r1, r0), RepShare::new(r2, r1)]
}

/// Reconstruct a shared value via wrapping addition.
pub fn open<C: RawChannel>(share: RepShare, prev: &mut C, next: &mut C) -> Result<u64> {
    write_u64(prev, share.data0).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let received = read_u64(next).with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(share.data0.wrapping_add(share.data1).wrapping_add(received))
}

/// Local componentwise addition.
pub fn add(x: RepShare, y: RepShare) -> RepShare {
    RepShare::new(x.data0.wrapping_add(y.data0), x.data1.wrapping_add(y.data1))
}

/// Local componentwise subtraction.
pub fn sub(x: RepShare, y: RepShare) -> RepShare {
    RepShare::new(x.data0.wrapping_sub(y.data0), x.data1.wrapping_sub(y.data1))
}

/// Add a public constant to the party conventionally holding slot zero
/// (callers decide which party that is; see DESIGN.md's note on the
/// `g = L - 1` initial-interval injection).
pub fn add_public(x: RepShare, c: u64, holds_slot: bool) -> RepShare {
    if holds_slot {
        RepShare::new(x.data0.wrapping_add(c), x.data1)
    } else {
        x
    }
}

/// Multiplication, DN07-style: each party locally forms its additive
/// piece of the product, masks it with a fresh arithmetic zero-share, and
/// exchanges the masked value with its ring neighbors exactly as
/// [`crate::sharing::binary_3p::and`] does for XOR.
pub fn mul<C: RawChannel>(
    x: RepShare,
    y: RepShare,
    corr: &mut CorrelatedRandomness,
    prev: &mut C,
    next: &mut C,
) -> Result<RepShare> {
    let local = x
        .data0
        .wrapping_mul(y.data0)
        .wrapping_add(x.data1.wrapping_mul(y.data0))
        .wrapping_add(x.data0.wrapping_mul(y.data1));
    let mask = corr.next_arithmetic_zero().with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z0 = local.wrapping_add(mask);

    write_u64(next, z0).with_context(|| format!("@{}:{}", file!(), line!()))?;
    let z1 = read_u64(prev).with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(RepShare::new(z0, z1))
}

/// `select(x, y, c) = x + c * (y - x)`, the arithmetic multiplexer used to
/// fold a rank-0/rank-1 choice into a single share during the wavelet-matrix
/// walk.
pub fn select<C: RawChannel>(
    x: RepShare,
    y: RepShare,
    c: RepShare,
    corr: &mut CorrelatedRandomness,
    prev: &mut C,
    next: &mut C,
) -> Result<RepShare> {
    let diff = sub(y, x);
    let scaled = mul(c, diff, corr, prev, next).with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(add(x, scaled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::StreamChannel;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::io::{BufReader, BufWriter};
    use std::os::unix::net::UnixStream;

    fn three_party_ring() -> Vec<(StreamChannel<UnixStream, UnixStream>, StreamChannel<UnixStream, UnixStream>)> {
        let (a0, a1) = UnixStream::pair().unwrap();
        let (b1, b2) = UnixStream::pair().unwrap();
        let (c2, c0) = UnixStream::pair().unwrap();
        let mk = |s: UnixStream| StreamChannel::new(BufReader::new(s.try_clone().unwrap()), BufWriter::new(s));
        vec![(mk(c0), mk(a0)), (mk(a1), mk(b1)), (mk(b2), mk(c2))]
    }

    #[test]
    fn open_recovers_the_value_mod_2_64() {
        let mut rng = StdRng::seed_from_u64(3);
        let shares = share_local(42, rng.gen(), rng.gen());
        let mut ring = three_party_ring();

        let h1 = {
            let s = shares[1];
            let (mut p, mut n) = ring.remove(1);
            std::thread::spawn(move || open(s, &mut p, &mut n).unwrap())
        };
        let h2 = {
            let s = shares[2];
            let (mut p, mut n) = ring.remove(1);
            std::thread::spawn(move || open(s, &mut p, &mut n).unwrap())
        };
        let (mut p0, mut n0) = ring.remove(0);
        let v0 = open(shares[0], &mut p0, &mut n0).unwrap();

        assert_eq!(v0, 42);
        assert_eq!(h1.join().unwrap(), 42);
        assert_eq!(h2.join().unwrap(), 42);
    }

    #[test]
    fn mul_computes_the_product() {
        let mut rng = StdRng::seed_from_u64(4);
        let x_val = 7u64;
        let y_val = 9u64;
        let xs = share_local(x_val, rng.gen(), rng.gen());
        let ys = share_local(y_val, rng.gen(), rng.gen());

        let keys = [[1u8; 16], [2u8; 16], [3u8; 16]];
        let mut ring = three_party_ring();
        let mut corr2 = CorrelatedRandomness::new(keys[2], keys[1], 32);
        let mut corr1 = CorrelatedRandomness::new(keys[1], keys[0], 32);
        let mut corr0 = CorrelatedRandomness::new(keys[0], keys[2], 32);

        let h1 = {
            let (x, y) = (xs[1], ys[1]);
            let (mut p, mut n) = ring.remove(1);
            std::thread::spawn(move || {
                let z = mul(x, y, &mut corr1, &mut p, &mut n).unwrap();
                open(z, &mut p, &mut n).unwrap()
            })
        };
        let h2 = {
            let (x, y) = (xs[2], ys[2]);
            let (mut p, mut n) = ring.remove(1);
            std::thread::spawn(move || {
                let z = mul(x, y, &mut corr2, &mut p, &mut n).unwrap();
                open(z, &mut p, &mut n).unwrap()
            })
        };
        let (mut p0, mut n0) = ring.remove(0);
        let z0 = mul(xs[0], ys[0], &mut corr0, &mut p0, &mut n0).unwrap();
        let opened0 = open(z0, &mut p0, &mut n0).unwrap();

        assert_eq!(opened0, x_val.wrapping_mul(y_val));
        assert_eq!(h1.join().unwrap(), x_val.wrapping_mul(y_val));
        assert_eq!(h2.join().unwrap(), x_val.wrapping_mul(y_val));
    }
}

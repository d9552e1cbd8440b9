//! Two-party additive sharing over `2^64`, used only by the offline
//! dealer while assembling DPF-adjacent keys (OblivSelect, ZeroTest).
//! Unlike [`crate::sharing::binary_3p`]/[`crate::sharing::arithmetic_3p`]
//! this never runs online: the dealer holds both parties' views directly
//! in one process, so "communication" is just reading the other half of a
//! pair already in hand.
//!
//! Grounded on `original_source/FssWM/sharing/additive_2p.h`
//! (`AdditiveSharing2P`, `BeaverTriple`).

use rand::RngCore;

/// A two-party additive share of a single `u64`: `x = share0 + share1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditiveShare2P {
    pub share0: u64,
    pub share1: u64,
}

impl AdditiveShare2P {
    /// Split `x` into two random additive shares.
    pub fn share<R: RngCore>(x: u64, rng: &mut R) -> Self {
        let share0 = rng.next_u64();
        let share1 = x.wrapping_sub(share0);
        AdditiveShare2P { share0, share1 }
    }

    /// Recombine the two shares.
    pub fn reconstruct(&self) -> u64 {
        self.share0.wrapping_add(self.share1)
    }
}

/// A Beaver multiplication triple `(a, b, c = a*b)`, each held as additive
/// shares. The dealer draws these offline and folds the corresponding
/// correction terms directly into generated keys rather than running an
/// online Beaver protocol.
#[derive(Debug, Clone, Copy)]
pub struct BeaverTriple {
    pub a: AdditiveShare2P,
    pub b: AdditiveShare2P,
    pub c: AdditiveShare2P,
}

impl BeaverTriple {
    /// Sample a fresh triple.
    pub fn sample<R: RngCore>(rng: &mut R) -> Self {
        let a_val = rng.next_u64();
        let b_val = rng.next_u64();
        let c_val = a_val.wrapping_mul(b_val);
        BeaverTriple {
            a: AdditiveShare2P::share(a_val, rng),
            b: AdditiveShare2P::share(b_val, rng),
            c: AdditiveShare2P::share(c_val, rng),
        }
    }
}

/// Multiply two additively-shared values using one triple, entirely
/// offline: since the dealer holds both halves, the opened values `d`,
/// `e` are computed directly rather than exchanged over a channel.
pub fn multiply_offline(x: AdditiveShare2P, y: AdditiveShare2P, triple: BeaverTriple) -> AdditiveShare2P {
    let d = x.reconstruct().wrapping_sub(triple.a.reconstruct());
    let e = y.reconstruct().wrapping_sub(triple.b.reconstruct());

    let share0 = triple
        .c
        .share0
        .wrapping_add(d.wrapping_mul(triple.b.share0))
        .wrapping_add(e.wrapping_mul(triple.a.share0));
    let share1 = triple
        .c
        .share1
        .wrapping_add(d.wrapping_mul(triple.b.share1))
        .wrapping_add(e.wrapping_mul(triple.a.share1))
        .wrapping_add(d.wrapping_mul(e));

    AdditiveShare2P { share0, share1 }
}

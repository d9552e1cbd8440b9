//! Three-party replicated secret sharing (Araki–Furukawa–Lindell–Nof
//! style) plus the two-party additive layer the offline dealer uses to
//! build DPF-adjacent keys.
//!
//! Grounded on `original_source/FssWM/sharing/{binary_3p,additive_3p,
//! share3_types}.h`. The 3-party engines never touch the network except
//! through the `prev`/`next` links exposed by
//! [`crate::channel_utils::tcp_channel::PartyLinks`]; the 2-party layer
//! ([`additive_2p`]) is purely in-process, used only by the dealer during
//! key generation.

pub mod additive_2p;
pub mod arithmetic_3p;
pub mod binary_3p;
pub mod correlated_randomness;
pub mod share_types;

pub use correlated_randomness::CorrelatedRandomness;
pub use share_types::{PartyId, RepShare, RepShareVec};

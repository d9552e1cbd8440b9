//! Function secret sharing primitives: the 128-bit [`Block`](block::Block)
//! word, the keyed AES-PRG built on top of it, and the distributed point
//! function (DPF) that the rest of the crate is built from.
//!
//! See `original_source/FssWM/fss` for the construction this module is
//! grounded on.

pub mod block;
pub mod dpf;
pub mod prg;

pub use block::Block;
pub use dpf::{DpfEvaluator, DpfKey, DpfKeyGenerator, DpfParameters, EvalType, OutputMode};
pub use prg::Prg;

//! Wavelet-matrix rank oracle and the FSS gadgets it is built from.
//!
//! [`obliv_select`] and [`zero_test`] are the cryptographic primitives;
//! [`fsswm`] chains them into the secure rank-CF walk over one level of a
//! wavelet matrix; [`plain_fm_index`] is a plaintext reference
//! implementation (BWT, wavelet matrix, rank tables) used only by tests
//! to check the secure walk against ground truth.

pub mod fsswm;
pub mod obliv_select;
pub mod plain_fm_index;
pub mod zero_test;

pub use fsswm::{FssWMKey, FssWMKeyGenerator, FssWMParameters};
pub use obliv_select::{OblivSelectKey, OblivSelectKeyGenerator, OblivSelectParameters};
pub use zero_test::{ZeroTestKey, ZeroTestKeyGenerator, ZeroTestParameters};

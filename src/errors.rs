//! Error taxonomy for the FssWM protocol stack.
//!
//! Every fallible public entry point returns [`anyhow::Result`]; the crate's
//! own failure modes are represented by [`FssWmError`] and wrapped with
//! `.with_context(|| format!("@{}:{}", file!(), line!()))` at the call site,
//! matching the annotation style of the library this crate is derived from.

use thiserror::Error;

/// The fixed set of ways a protocol step can fail.
///
/// No step recovers from one of these internally; they all surface at the
/// outermost call (`evaluate_lpm`, `evaluate_rank_cf`, `evaluate`, ...) and
/// the caller is expected to tear down the three-party session.
#[derive(Debug, Error)]
pub enum FssWmError {
    /// `n`, `e`, `d`, `sigma`, or `query_len` violated a documented
    /// constraint (e.g. `alpha >= 2^n`, or `sigma` exceeds the DPF-supported
    /// alphabet width). Not recoverable in-flight; the caller must fix its
    /// configuration and start a fresh query.
    #[error("invalid parameter: {0}")]
    ParameterInvalid(String),

    /// A key's serialized byte count disagreed with
    /// `calculate_serialized_size`. The key is unusable; loading must abort.
    #[error("serialized length mismatch: expected {expected} bytes, got {actual}")]
    SerializationLengthMismatch {
        /// Size computed from the in-memory structure.
        expected: usize,
        /// Size actually present in the byte buffer.
        actual: usize,
    },

    /// A correlated-randomness or Beaver-triple store was consumed past its
    /// provisioned count. Not retriable online; the offline phase must be
    /// re-run with a larger buffer.
    #[error("randomness buffer exhausted: requested {requested}, had {available}")]
    RandomnessExhausted {
        /// Units requested by the caller.
        requested: usize,
        /// Units actually left in the buffer.
        available: usize,
    },

    /// A `send`/`recv` on a party link returned short or errored. The
    /// three-party session is torn down; all shares for the query are
    /// discarded.
    #[error("transport failure on {link} link: {source}")]
    TransportFailure {
        /// Which ring link failed (`"prev"` or `"next"`).
        link: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The DPF `eval_type` selected at evaluation time does not match the
    /// one recorded at key generation. Keys and evaluator must agree.
    #[error("capability mismatch: key generated for {generated:?}, evaluator configured for {requested:?}")]
    CapabilityMismatch {
        /// `EvalType` the key was generated under (as its `Debug` string).
        generated: String,
        /// `EvalType` the evaluator was asked to use (as its `Debug` string).
        requested: String,
    },
}

impl FssWmError {
    /// Build a [`FssWmError::ParameterInvalid`] from a formatted message.
    pub fn parameter_invalid(msg: impl Into<String>) -> Self {
        Self::ParameterInvalid(msg.into())
    }
}

//! Process-wide tunables that aren't part of any single protocol's
//! parameter envelope: how eagerly to hand CPU-bound batch work to a
//! worker pool, and how long a network link may sit idle before a query
//! aborts. [`RuntimeConfig::should_parallelize`] gates the
//! `crossbeam::scope` fan-out in [`crate::wm::obliv_select`]'s
//! dot-product step.
//!
//! Grounded on the teacher's `MultiThreadOptimization` flag
//! (`cli_utils.rs`), which gates its own multi-threaded protocol path,
//! and `channel_utils::tcp_channel::TIMEOUT`.

use std::time::Duration;

use crate::channel_utils::tcp_channel::TIMEOUT;

/// Runtime tunables shared across a party process.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Minimum batch size (DPF full-domain expansions, OblivSelect
    /// dot-product entries) before farming work out to a
    /// `crossbeam::scope` worker pool instead of running it inline.
    pub parallel_threshold: usize,
    /// Read/write timeout applied to every ring link.
    pub link_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig { parallel_threshold: 1 << 12, link_timeout: TIMEOUT }
    }
}

impl RuntimeConfig {
    /// Build a config with an explicit threshold and timeout.
    pub fn new(parallel_threshold: usize, link_timeout: Duration) -> Self {
        RuntimeConfig { parallel_threshold, link_timeout }
    }

    /// Whether a batch of `len` items is large enough to justify
    /// spawning a worker-pool scope rather than running inline.
    pub fn should_parallelize(&self, len: usize) -> bool {
        len >= self.parallel_threshold
    }
}

//! CLI surface for the `dealer` (offline) and `party` (online) binaries.
//!
//! Mirrors the teacher's `PrePSIArgs`/`KmprtArgs` split between its own
//! two binaries: parameter envelopes double as `clap::Args` structs, and
//! each binary gets one `#[derive(Subcommand)]` enum for its verb set
//! (`setup`/`keygen` offline, `serve`/`query` online), per §6.4.

use std::fmt::Display;

use clap::{Parser, Subcommand, ValueEnum};

use crate::fm_index::FssFMIParameters;
use crate::wm::{FssWMParameters, OblivSelectParameters, ZeroTestParameters};

/// Channel transport a `party` process listens on.
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum ChannelType {
    /// TCP, the only transport the shipped ring setup implements.
    Tcp,
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Tcp => write!(f, "tcp"),
        }
    }
}

/// `OblivSelectParameters` as a CLI argument group.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct OblivSelectParametersArgs {
    /// Bitwidth of the table-row domain (`2^d` entries per row).
    #[arg(short = 'd', long, default_value_t = 8)]
    pub d: u32,
}

impl From<OblivSelectParametersArgs> for OblivSelectParameters {
    fn from(args: OblivSelectParametersArgs) -> Self {
        OblivSelectParameters::new(args.d)
    }
}

/// `FssWMParameters` as a CLI argument group.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct FssWMParametersArgs {
    /// Bitwidth of the table-row domain.
    #[arg(short = 'd', long, default_value_t = 8)]
    pub d: u32,
    /// Alphabet size (5 for DNA + sentinel).
    #[arg(long, default_value_t = 5)]
    pub sigma: u32,
}

impl From<FssWMParametersArgs> for FssWMParameters {
    fn from(args: FssWMParametersArgs) -> Self {
        FssWMParameters::new(args.d, args.sigma)
    }
}

/// `ZeroTestParameters` as a CLI argument group.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct ZeroTestParametersArgs {
    /// Bitwidth of the tested value.
    #[arg(short = 'n', long, default_value_t = 8)]
    pub n: u32,
}

impl From<ZeroTestParametersArgs> for ZeroTestParameters {
    fn from(args: ZeroTestParametersArgs) -> Self {
        ZeroTestParameters::new(args.n)
    }
}

/// `FssFMIParameters` as a CLI argument group.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct FssFMIParametersArgs {
    /// Bitwidth of the table-row domain.
    #[arg(short = 'd', long, default_value_t = 8)]
    pub d: u32,
    /// Query length in symbols.
    #[arg(short = 'q', long)]
    pub query_len: usize,
    /// Alphabet size.
    #[arg(long, default_value_t = 5)]
    pub sigma: u32,
}

impl From<FssFMIParametersArgs> for FssFMIParameters {
    fn from(args: FssFMIParametersArgs) -> Self {
        FssFMIParameters::new(args.d, args.query_len, args.sigma)
    }
}

/// `dealer`: the offline party. Builds the FM-index from a text file and
/// generates per-party key bundles for a query.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, next_line_help = true)]
pub struct DealerArgs {
    /// Verb to run.
    #[command(subcommand)]
    pub command: DealerCommand,
}

/// `dealer` subcommands.
#[derive(Subcommand, Debug)]
pub enum DealerCommand {
    /// Build the BWT and wavelet-matrix rank-0 tables from a plaintext
    /// text file and write each party's replicated table shares to
    /// `out_dir`.
    Setup {
        /// Path to the plaintext (DNA/protein symbols, one per line or
        /// packed as bytes — format is the caller's convention).
        #[arg(long)]
        text: String,
        /// Alphabet size (sentinel included).
        #[arg(long, default_value_t = 5)]
        sigma: u32,
        /// Directory to write each party's table-share files into.
        #[arg(long)]
        out_dir: String,
    },
    /// Generate one fresh `FssFMIKey` triple for a query of the given
    /// length, writing one key file per party to `out_dir`.
    Keygen {
        #[command(flatten)]
        params: FssFMIParametersArgs,
        /// Directory to write `party0.key`/`party1.key`/`party2.key` into.
        #[arg(long)]
        out_dir: String,
    },
    /// Replicated-share a query pattern's character bits and write one
    /// shares file per party to `out_dir`. A demo convenience: in
    /// practice the querying party would secret-share its own pattern
    /// rather than hand it to the dealer in the clear.
    ShareQuery {
        /// The pattern to share, as DNA symbols (A/C/G/T).
        #[arg(long)]
        pattern: String,
        /// Alphabet size, matching the `keygen` call this query targets.
        #[arg(long, default_value_t = 5)]
        sigma: u32,
        /// Directory to write `party0.query`/`party1.query`/`party2.query`
        /// into.
        #[arg(long)]
        out_dir: String,
    },
}

/// `party`: the online party. Joins the three-party ring and answers
/// queries using key material the dealer produced.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, next_line_help = true)]
pub struct PartyArgs {
    /// This party's ring position, `0..3`.
    #[arg(short = 'i', long)]
    pub party_id: usize,
    /// Base TCP port; this party binds `base_port + party_id`.
    #[arg(short = 'p', long, default_value_t = 10000)]
    pub base_port: u16,
    /// Channel transport.
    #[arg(short = 'c', long = "channel", default_value_t = ChannelType::Tcp)]
    pub channel_type: ChannelType,
    /// Verb to run.
    #[command(subcommand)]
    pub command: PartyCommand,
}

/// `party` subcommands.
#[derive(Subcommand, Debug)]
pub enum PartyCommand {
    /// Join the ring and wait for queries, holding key/table material
    /// already written by `dealer`.
    Serve {
        /// Directory holding this party's table-share file.
        #[arg(long)]
        table_dir: String,
    },
    /// Run one query against a running `serve` session's key material
    /// and print the opened result.
    Query {
        /// Directory holding this party's table-share file (as passed to
        /// a sibling `serve` invocation).
        #[arg(long)]
        table_dir: String,
        /// Path to this party's `FssFMIKey` file from `dealer keygen`.
        #[arg(long)]
        key_file: String,
        /// Path to this party's replicated shares of the query
        /// character bits.
        #[arg(long)]
        query_shares_file: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn dealer_args_satisfy_clap_invariants() {
        DealerArgs::command().debug_assert();
    }

    #[test]
    fn party_args_satisfy_clap_invariants() {
        PartyArgs::command().debug_assert();
    }
}

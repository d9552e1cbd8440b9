//! Online party: joins the three-party TCP ring and runs a longest-
//! prefix-match query against key and table material `dealer` produced.

use anyhow::{Context, Result};
use clap::Parser;
use fsswm::channel_utils::tcp_channel::{create_ring_channels, PartyLinks};
use fsswm::cli_utils::{ChannelType, PartyArgs, PartyCommand};
use fsswm::fm_index::{self, FssFMIKey, RankTables};
use fsswm::sharing::binary_3p;
use fsswm::sharing::correlated_randomness::{CorrelatedRandomness, DEFAULT_BUFFER_BLOCKS};
use fsswm::sharing::share_types::RepShare;
use fsswm::wire::{Cursor, WireCodec};
use tracing::info;

fn load_randomness_keys(path: &str) -> Result<([u8; 16], [u8; 16])> {
    let raw = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    anyhow::ensure!(raw.len() == 32, "{path}: expected 32 bytes of PRZS keys, got {}", raw.len());
    let mut key_own = [0u8; 16];
    let mut key_prev = [0u8; 16];
    key_own.copy_from_slice(&raw[0..16]);
    key_prev.copy_from_slice(&raw[16..32]);
    Ok((key_own, key_prev))
}

/// Table-share file layout written by `dealer setup`: the plaintext
/// length, then one `(own, prev)` pair of equal-length rows per
/// wavelet-matrix level.
fn load_tables(path: &str) -> Result<(u64, RankTables)> {
    let raw = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let mut cursor = Cursor::new(&raw);
    let text_len = cursor.get_u64()?;
    let num_levels = cursor.get_u64()? as usize;
    let mut own_levels = Vec::with_capacity(num_levels);
    let mut prev_levels = Vec::with_capacity(num_levels);
    for _ in 0..num_levels {
        let len = cursor.get_u64()? as usize;
        let own: Vec<u64> = (0..len).map(|_| cursor.get_u64()).collect::<Result<_>>()?;
        let prev: Vec<u64> = (0..len).map(|_| cursor.get_u64()).collect::<Result<_>>()?;
        own_levels.push(own);
        prev_levels.push(prev);
    }
    anyhow::ensure!(cursor.remaining() == 0, "trailing bytes in table-share file {path}");
    Ok((text_len, RankTables::new(own_levels, prev_levels)))
}

/// Pads every level's rows up to `domain` entries, repeating the last
/// (total-count) entry, matching how a rank-CF table behaves past the
/// end of the text.
fn pad_tables(tables: RankTables, domain: usize) -> RankTables {
    let (mut own, mut prev) = tables.into_rows();
    for row in own.iter_mut().chain(prev.iter_mut()) {
        if row.len() < domain {
            let fill = row.last().copied().unwrap_or(0);
            row.resize(domain, fill);
        }
    }
    RankTables::new(own, prev)
}

/// Query-shares file layout written by `dealer share-query`: one
/// replicated share per wavelet-matrix level, per query character.
fn load_query_shares(path: &str) -> Result<Vec<Vec<RepShare>>> {
    let raw = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let mut cursor = Cursor::new(&raw);
    let num_chars = cursor.get_u64()? as usize;
    let mut chars = Vec::with_capacity(num_chars);
    for _ in 0..num_chars {
        let bits = cursor.get_u64()? as usize;
        let shares: Vec<RepShare> = (0..bits).map(|_| cursor.get_rep_share()).collect::<Result<_>>()?;
        chars.push(shares);
    }
    anyhow::ensure!(cursor.remaining() == 0, "trailing bytes in query-shares file {path}");
    Ok(chars)
}

fn join_ring(args: &PartyArgs) -> Result<PartyLinks> {
    match args.channel_type {
        ChannelType::Tcp => create_ring_channels(args.base_port, args.party_id).with_context(|| format!("party {} joining ring", args.party_id)),
    }
}

fn serve(args: &PartyArgs, table_dir: &str) -> Result<()> {
    let links = join_ring(args)?;
    let (text_len, _tables) = load_tables(&format!("{table_dir}/party{}.tables", args.party_id))?;
    info!(party_id = links.party_id, text_len, "ring joined, table shares loaded, ready for queries");
    Ok(())
}

fn query(args: &PartyArgs, key_file: &str, query_shares_file: &str, table_dir: &str) -> Result<()> {
    let key = FssFMIKey::from_wire(&std::fs::read(key_file).with_context(|| format!("reading {key_file}"))?)?;
    let query_char_bits = load_query_shares(query_shares_file)?;

    let (text_len, raw_tables) = load_tables(&format!("{table_dir}/party{}.tables", args.party_id))?;
    let tables = pad_tables(raw_tables, key.domain_size());

    // `dealer keygen` writes `partyN.randkeys` alongside `partyN.key`, in
    // its own `--out-dir`, which need not be the same directory as
    // `--table-dir`.
    let keys_dir = std::path::Path::new(key_file).parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_else(|| ".".to_string());
    let (key_own, key_prev) = load_randomness_keys(&format!("{keys_dir}/party{}.randkeys", args.party_id))?;
    let mut corr = CorrelatedRandomness::new(key_own, key_prev, DEFAULT_BUFFER_BLOCKS);

    let mut links = join_ring(args)?;

    let diffs_zero = fm_index::evaluate(&key, text_len, &query_char_bits, &tables, &mut corr, &mut links.prev, &mut links.next)
        .context("running FssFMI query")?;

    let mut opened = Vec::with_capacity(diffs_zero.len());
    for share in diffs_zero {
        opened.push(binary_3p::open(share, &mut links.prev, &mut links.next).context("opening per-position zero-test result")?);
    }

    let lpm_len = fm_index::lpm_length_from_opened(&opened);
    info!(party_id = links.party_id, lpm_len, "query complete");
    println!("{lpm_len}");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = PartyArgs::parse();
    match &args.command {
        PartyCommand::Serve { table_dir } => serve(&args, table_dir),
        PartyCommand::Query { table_dir, key_file, query_shares_file } => query(&args, key_file, query_shares_file, table_dir),
    }
}

//! Offline dealer: builds the BWT + wavelet-matrix tables from a text
//! file and generates per-party key bundles for a fixed-length query.

use anyhow::{Context, Result};
use clap::Parser;
use fsswm::cli_utils::{DealerArgs, DealerCommand};
use fsswm::fm_index::{FssFMIKeyGenerator, FssFMIParameters};
use fsswm::sharing::arithmetic_3p;
use fsswm::wire::WireCodec;
use fsswm::wm::plain_fm_index::{bits_for_sigma, PlainFmIndex};
use rand::{thread_rng, RngCore};
use tracing::info;

fn symbol_for_byte(b: u8) -> Result<u32> {
    match b {
        b'A' => Ok(0),
        b'C' => Ok(1),
        b'G' => Ok(2),
        b'T' => Ok(3),
        _ => anyhow::bail!("unsupported text symbol {b:?}; only A/C/G/T are accepted"),
    }
}

fn setup(text_path: &str, sigma: u32, out_dir: &str) -> Result<()> {
    let raw = std::fs::read(text_path).with_context(|| format!("reading {text_path}"))?;
    let symbols: Vec<u32> = raw
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .map(symbol_for_byte)
        .collect::<Result<_>>()?;

    let index = PlainFmIndex::build(&symbols, sigma);
    info!(text_len = index.len(), levels = index.num_wm_levels(), "built FM-index");

    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {out_dir}"))?;

    // All table weight lands on s_0 (s_1 = s_2 = 0). Party `me` holds the
    // replicated pair `(s_me, s_{me-1 mod 3})`, so party 0 carries the
    // table in its `own` slot and party 1 carries it in `prev`; party 2
    // holds all zeros. See DESIGN.md for why the dealer picks this
    // one-sided distribution.
    for party in 0..3usize {
        let mut buf = Vec::new();
        fsswm::wire::put_u64(&mut buf, index.len() as u64);
        fsswm::wire::put_u64(&mut buf, index.num_wm_levels() as u64);
        for level in 0..index.num_wm_levels() {
            let table = index.rank0_table(level);
            let own: Vec<u64> = if party == 0 { table.to_vec() } else { vec![0u64; table.len()] };
            let prev: Vec<u64> = if party == 1 { table.to_vec() } else { vec![0u64; table.len()] };
            fsswm::wire::put_u64(&mut buf, own.len() as u64);
            for v in &own {
                fsswm::wire::put_u64(&mut buf, *v);
            }
            for v in &prev {
                fsswm::wire::put_u64(&mut buf, *v);
            }
        }
        let path = format!("{out_dir}/party{party}.tables");
        std::fs::write(&path, &buf).with_context(|| format!("writing {path}"))?;
    }

    info!(out_dir, "wrote per-party table shares");
    Ok(())
}

fn keygen(params: FssFMIParameters, out_dir: &str) -> Result<()> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {out_dir}"))?;
    let generator = FssFMIKeyGenerator::new(params);
    let mut rng = thread_rng();
    let keys = generator.generate_keys(&mut rng).context("generating FssFMI keys")?;

    // PRZS keys for `CorrelatedRandomness`: party i's pairwise secret with
    // `next` is przs_keys[i]; its secret with `prev` is przs_keys[i-1 mod
    // 3]. See §4.4; the dealer is the trusted party handing these out.
    let mut przs_keys = [[0u8; 16]; 3];
    for key in &mut przs_keys {
        rng.fill_bytes(key);
    }

    for (party, key) in keys.iter().enumerate() {
        let path = format!("{out_dir}/party{party}.key");
        std::fs::write(&path, key.to_wire()).with_context(|| format!("writing {path}"))?;

        let key_own = przs_keys[party];
        let key_prev = przs_keys[(party + 2) % 3];
        let mut rand_buf = Vec::with_capacity(32);
        rand_buf.extend_from_slice(&key_own);
        rand_buf.extend_from_slice(&key_prev);
        let rand_path = format!("{out_dir}/party{party}.randkeys");
        std::fs::write(&rand_path, &rand_buf).with_context(|| format!("writing {rand_path}"))?;
    }
    info!(out_dir, "wrote per-party key bundles");
    Ok(())
}

fn share_query(pattern: &str, sigma: u32, out_dir: &str) -> Result<()> {
    let symbols: Vec<u32> = pattern.bytes().map(symbol_for_byte).collect::<Result<_>>()?;
    let bits = bits_for_sigma(sigma) as usize;
    let mut rng = thread_rng();

    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {out_dir}"))?;
    let mut bufs = [Vec::new(), Vec::new(), Vec::new()];
    for buf in &mut bufs {
        fsswm::wire::put_u64(buf, symbols.len() as u64);
    }

    for &c in &symbols {
        for buf in &mut bufs {
            fsswm::wire::put_u64(buf, bits as u64);
        }
        for lvl in 0..bits {
            let bit = ((c >> (bits - 1 - lvl)) & 1) as u64;
            let shares = arithmetic_3p::share_local(bit, rng.next_u64(), rng.next_u64());
            for (party, share) in shares.into_iter().enumerate() {
                fsswm::wire::put_rep_share(&mut bufs[party], share);
            }
        }
    }

    for (party, buf) in bufs.into_iter().enumerate() {
        let path = format!("{out_dir}/party{party}.query");
        std::fs::write(&path, &buf).with_context(|| format!("writing {path}"))?;
    }
    info!(out_dir, symbols = symbols.len(), "wrote per-party query-character shares");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = DealerArgs::parse();
    match args.command {
        DealerCommand::Setup { text, sigma, out_dir } => setup(&text, sigma, &out_dir),
        DealerCommand::Keygen { params, out_dir } => keygen(params.into(), &out_dir),
        DealerCommand::ShareQuery { pattern, sigma, out_dir } => share_query(&pattern, sigma, &out_dir),
    }
}

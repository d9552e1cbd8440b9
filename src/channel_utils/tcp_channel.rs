//! TCP ring setup for the strict three-party topology: each party opens
//! exactly two links, `prev` and `next`, rather than the teacher's
//! `create_tcp_channels` full mesh over `nparties`.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};

use super::StreamChannel;

/// Default timeout for the handshake connect and every subsequent
/// `send`/`recv`, mirroring the teacher's `TIMEOUT` constant.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// The two links a party holds: `prev` is `(party_id + 2) % 3`, `next` is
/// `(party_id + 1) % 3`.
pub struct PartyLinks {
    /// This party's ring position, `0..3`.
    pub party_id: usize,
    /// Channel to `(party_id + 2) % 3`.
    pub prev: StreamChannel<TcpStream, TcpStream>,
    /// Channel to `(party_id + 1) % 3`.
    pub next: StreamChannel<TcpStream, TcpStream>,
}

/// Connect the three-party ring over TCP on `127.0.0.1`, ports
/// `base_port + 0..3`. Blocks until all three parties have joined.
///
/// Party `me` binds `base_port + me` and accepts `next`'s connection while
/// dialing `prev`, mirroring the teacher's `create_tcp_channel_for_party`
/// retry-with-backoff shape (a short sleep proportional to `me` avoids
/// every party racing to dial before its peers have bound).
pub fn create_ring_channels(base_port: u16, me: usize) -> Result<PartyLinks> {
    assert!(me < 3, "the FssWM ring is strictly three parties");
    let prev_id = (me + 2) % 3;
    let next_id = (me + 1) % 3;

    let my_addr = SocketAddr::from(([127, 0, 0, 1], base_port + me as u16));
    let listener = TcpListener::bind(my_addr).with_context(|| format!("me={me} addr={my_addr} @{}:{}", file!(), line!()))?;

    sleep(Duration::from_millis(100 * me as u64));

    let prev_addr = SocketAddr::from(([127, 0, 0, 1], base_port + prev_id as u16));
    let prev_stream = TcpStream::connect_timeout(&prev_addr, TIMEOUT)
        .with_context(|| format!("me={me} connecting to prev={prev_id} @{prev_addr} @{}:{}", file!(), line!()))?;
    prev_stream.set_read_timeout(Some(TIMEOUT)).with_context(|| format!("@{}:{}", file!(), line!()))?;
    prev_stream.set_write_timeout(Some(TIMEOUT)).with_context(|| format!("@{}:{}", file!(), line!()))?;

    let (next_stream, _peer) = listener
        .accept()
        .with_context(|| format!("me={me} awaiting next={next_id} @{}:{}", file!(), line!()))?;
    next_stream.set_read_timeout(Some(TIMEOUT)).with_context(|| format!("@{}:{}", file!(), line!()))?;
    next_stream.set_write_timeout(Some(TIMEOUT)).with_context(|| format!("@{}:{}", file!(), line!()))?;

    let prev = StreamChannel::new(
        BufReader::new(prev_stream.try_clone().with_context(|| format!("@{}:{}", file!(), line!()))?),
        BufWriter::new(prev_stream),
    );
    let next = StreamChannel::new(
        BufReader::new(next_stream.try_clone().with_context(|| format!("@{}:{}", file!(), line!()))?),
        BufWriter::new(next_stream),
    );

    Ok(PartyLinks { party_id: me, prev, next })
}

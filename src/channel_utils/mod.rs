//! Channel utilities. Channels carry the wire format of §6.1 between the
//! three parties of a query: every protocol step is phrased as a sequence
//! of `write_*`/`read_*` calls over a generic channel, exactly as the
//! teacher crate's `write_vec_f`/`read_vec_f` free functions operate over
//! any `C: AbstractChannel`.
//!
//! # Example
//!
//! ```
//! use fsswm::channel_utils::{StreamChannel, write_u64, read_u64};
//! use std::io::{BufReader, BufWriter};
//! use std::os::unix::net::UnixStream;
//! use anyhow::Result;
//!
//! # fn try_main() -> Result<()> {
//! let (a, b) = UnixStream::pair()?;
//!
//! let handle = std::thread::spawn(move || -> Result<()> {
//!     let mut channel = StreamChannel::new(BufReader::new(a.try_clone()?), BufWriter::new(a));
//!     write_u64(&mut channel, 42)?;
//!     Ok(())
//! });
//!
//! let mut channel = StreamChannel::new(BufReader::new(b.try_clone()?), BufWriter::new(b));
//! let v = read_u64(&mut channel)?;
//! assert_eq!(v, 42);
//!
//! handle.join().unwrap()?;
//! # Ok(())
//! # }
//! # fn main() { try_main().unwrap(); }
//! ```

pub mod tcp_channel;

use std::io::{self, BufReader, BufWriter, Read, Write};

use anyhow::{Context, Result};

use crate::fss::Block;

/// The minimal read/write/flush surface a protocol step needs. Implemented
/// once for any paired `BufReader`/`BufWriter`, then every send/recv
/// helper below is generic over it — mirroring the teacher's
/// `write_vec_f<F, C: AbstractChannel>` shape.
pub trait RawChannel {
    /// Write the whole buffer or fail.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    /// Read exactly `buf.len()` bytes or fail.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
    /// Flush any buffered writes.
    fn flush(&mut self) -> io::Result<()>;
}

/// A duplex channel built from a separate reader and writer half of the
/// same underlying stream (a `TcpStream`/`UnixStream` and its
/// `try_clone()`).
pub struct StreamChannel<R, W> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
}

impl<R: Read, W: Write> StreamChannel<R, W> {
    /// Wrap an already-buffered reader/writer pair.
    pub fn new(reader: BufReader<R>, writer: BufWriter<W>) -> Self {
        StreamChannel { reader, writer }
    }
}

impl<R: Read, W: Write> RawChannel for StreamChannel<R, W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.writer, buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Read::read_exact(&mut self.reader, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Send a single `u64` (8 bytes, little-endian), flushing immediately —
/// every protocol round in this crate is small-message, latency-bound
/// traffic, so no call site benefits from deferred flushing.
pub fn write_u64<C: RawChannel>(channel: &mut C, v: u64) -> Result<()> {
    channel
        .write_all(&v.to_le_bytes())
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    channel.flush().with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(())
}

/// Inverse of [`write_u64`].
pub fn read_u64<C: RawChannel>(channel: &mut C) -> Result<u64> {
    let mut buf = [0u8; 8];
    channel
        .read_exact(&mut buf)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(u64::from_le_bytes(buf))
}

/// Send a single `Block` (16 bytes).
pub fn write_block<C: RawChannel>(channel: &mut C, b: Block) -> Result<()> {
    channel
        .write_all(&b.to_bytes())
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    channel.flush().with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(())
}

/// Inverse of [`write_block`].
pub fn read_block<C: RawChannel>(channel: &mut C) -> Result<Block> {
    let mut buf = [0u8; 16];
    channel
        .read_exact(&mut buf)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(Block::from_bytes(buf))
}

/// Send a length-framed vector of `u64`s (`len (u64) | len * 8 bytes`),
/// matching §6.1's vector-send convention.
pub fn write_vec_u64<C: RawChannel>(channel: &mut C, v: &[u64]) -> Result<()> {
    write_u64(channel, v.len() as u64)?;
    let bytes: Vec<u8> = v.iter().flat_map(|x| x.to_le_bytes()).collect();
    channel
        .write_all(&bytes)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    channel.flush().with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(())
}

/// Inverse of [`write_vec_u64`].
pub fn read_vec_u64<C: RawChannel>(channel: &mut C) -> Result<Vec<u64>> {
    let len = read_u64(channel)? as usize;
    let mut bytes = vec![0u8; len * 8];
    channel
        .read_exact(&mut bytes)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(bytes.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect())
}

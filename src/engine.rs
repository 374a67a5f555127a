//! The buffer-recycling transfer loops.
//!
//! [`provide`] streams blocks into a writer, [`consume`] reads into blocks
//! from a reader. Both run the same cycle: one I/O call per iteration,
//! update the counters, publish a snapshot, recycle the block, pick up the
//! next one. Every pool and stats operation after the initial acquire is
//! non-blocking with an explicit fallback (drop, repeat, skip), so the only
//! place a loop can stall is the socket itself. That property is what makes
//! the reported rate a measurement of the network rather than of internal
//! bookkeeping.
//!
//! A loop ends in exactly two ways: the pool is closed (clean end, `Ok`) or
//! the I/O call fails (terminal, `Err`). Backpressure is never an error.

use crate::pool::{Block, BlockPool, Exchange};
use crate::stats::{StatsPublisher, TransferStats};
use crate::{Error, Result};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Streams block contents into `writer` until the pool closes or a write
/// fails.
///
/// Each iteration issues exactly one write call with the current block's
/// full contents. A write error is terminal and propagated as-is; the last
/// published snapshot reflects only the iterations that completed, and the
/// in-flight block is handed back so a shared pool keeps its full capacity.
/// When recycling yields no replacement the current block is re-sent
/// (payload staleness is irrelevant to throughput measurement) and a repeat
/// is counted.
pub async fn provide<W>(writer: &mut W, pool: &BlockPool, stats: &StatsPublisher) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(mut block) = pool.acquire().await else {
        return Ok(());
    };

    let mut s = TransferStats::default();
    let start = Instant::now();
    let mut idle = start;
    loop {
        s.overhead += idle.elapsed();
        let n = match writer.write(&block).await {
            Ok(n) => n,
            Err(e) => {
                let _ = pool.try_release(block);
                return Err(e.into());
            }
        };
        idle = Instant::now();

        s.bytes += n as u64;
        s.blocks += 1;
        s.elapsed = start.elapsed();

        stats.publish(s);

        match recycle(pool, &mut block, &mut s) {
            Cycle::Continue => {}
            Cycle::SourceClosed => return Ok(()),
        }
    }
}

/// Reads from `reader` into blocks until the pool closes or a read fails.
///
/// Mirror of [`provide`]. No framing is imposed: each successful read of
/// n > 0 bytes counts one block and n bytes, however short the read. A read
/// of zero bytes means the peer closed the connection and is reported as a
/// connection error, matching the caller-side contract that only pool
/// closure ends a session cleanly. Terminal exits hand the in-flight block
/// back to the pool.
pub async fn consume<R>(reader: &mut R, pool: &BlockPool, stats: &StatsPublisher) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut block) = pool.acquire().await else {
        return Ok(());
    };

    let mut s = TransferStats::default();
    let start = Instant::now();
    let mut idle = start;
    loop {
        s.overhead += idle.elapsed();
        let n = match reader.read(&mut block).await {
            Ok(n) => n,
            Err(e) => {
                let _ = pool.try_release(block);
                return Err(e.into());
            }
        };
        idle = Instant::now();

        if n == 0 {
            let _ = pool.try_release(block);
            return Err(Error::Connection(
                "connection closed by peer".to_string(),
            ));
        }

        s.bytes += n as u64;
        s.blocks += 1;
        s.elapsed = start.elapsed();

        stats.publish(s);

        match recycle(pool, &mut block, &mut s) {
            Cycle::Continue => {}
            Cycle::SourceClosed => return Ok(()),
        }
    }
}

enum Cycle {
    Continue,
    SourceClosed,
}

/// Trades the just-used block for the next one, without blocking.
///
/// Release comes before acquire: the used block goes back into the pool,
/// then the next one is taken, atomically. A full pool means the used block
/// is discarded and counted as dropped; a repeat is counted only when the
/// pool had nothing to hand out at all. A closed pool ends the session.
fn recycle(pool: &BlockPool, block: &mut Block, s: &mut TransferStats) -> Cycle {
    match pool.exchange(block) {
        Exchange::Swapped => Cycle::Continue,
        Exchange::Dropped => {
            s.dropped += 1;
            Cycle::Continue
        }
        Exchange::Repeated => {
            s.repeats += 1;
            Cycle::Continue
        }
        Exchange::Closed => Cycle::SourceClosed,
    }
}

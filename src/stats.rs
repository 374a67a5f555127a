//! Transfer statistics and the snapshot channel between engine and reporter.
//!
//! The transfer engine publishes an immutable [`TransferStats`] snapshot after
//! every I/O call. Publishing never blocks: the channel keeps only the latest
//! value and the reporter samples it on its own schedule, so snapshots the
//! reporter was not ready for are simply overwritten. Counters are monotone
//! within a session, which keeps any two sampled snapshots safely
//! delta-able regardless of how many intermediate ones were skipped.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

/// Cumulative counters for one transfer session.
///
/// All fields are monotonically non-decreasing for the lifetime of a session.
///
/// # Examples
///
/// ```
/// use netgauge::stats::TransferStats;
/// use std::time::Duration;
///
/// let earlier = TransferStats {
///     bytes: 1_000_000,
///     blocks: 100,
///     elapsed: Duration::from_secs(1),
///     ..Default::default()
/// };
/// let later = TransferStats {
///     bytes: 3_000_000,
///     blocks: 300,
///     elapsed: Duration::from_secs(2),
///     ..Default::default()
/// };
///
/// let window = later.since(&earlier);
/// assert_eq!(window.bytes, 2_000_000);
/// assert_eq!(window.bits_per_second(), 16_000_000.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    /// Total bytes moved by successful I/O calls.
    pub bytes: u64,
    /// Total I/O calls that succeeded. One call per loop iteration, so this
    /// counts calls, not fixed-size transfers.
    pub blocks: u64,
    /// Wall time since the session started.
    pub elapsed: Duration,
    /// Time spent in pool and stats bookkeeping between I/O calls.
    pub overhead: Duration,
    /// Iterations that reused the previous block because no fresh block was
    /// immediately available.
    pub repeats: u64,
    /// Blocks discarded because returning them to the pool would have blocked.
    pub dropped: u64,
}

impl TransferStats {
    /// Field-wise difference against an earlier snapshot.
    ///
    /// Well-defined when every field of `self` is >= the corresponding field
    /// of `earlier`, which holds for any two snapshots of one session taken
    /// in order. `s.since(&s)` is all zeros. Subtraction saturates, so a
    /// misordered pair yields zeros rather than a panic.
    pub fn since(&self, earlier: &TransferStats) -> TransferStats {
        TransferStats {
            bytes: self.bytes.saturating_sub(earlier.bytes),
            blocks: self.blocks.saturating_sub(earlier.blocks),
            elapsed: self.elapsed.saturating_sub(earlier.elapsed),
            overhead: self.overhead.saturating_sub(earlier.overhead),
            repeats: self.repeats.saturating_sub(earlier.repeats),
            dropped: self.dropped.saturating_sub(earlier.dropped),
        }
    }

    /// Throughput in bits per second over this snapshot's elapsed time.
    ///
    /// Returns 0.0 when no time has elapsed.
    pub fn bits_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.bytes as f64 * 8.0) / secs
        } else {
            0.0
        }
    }
}

/// Creates a connected publisher/feed pair for one session.
pub fn stats_channel() -> (StatsPublisher, StatsFeed) {
    let (tx, rx) = watch::channel(TransferStats::default());
    (StatsPublisher { tx }, StatsFeed { rx })
}

/// Engine-side handle: overwrites the latest snapshot, never blocks.
#[derive(Debug)]
pub struct StatsPublisher {
    tx: watch::Sender<TransferStats>,
}

impl StatsPublisher {
    /// Publishes a snapshot. Best-effort: a snapshot the reporter never
    /// samples is silently superseded by the next one.
    pub fn publish(&self, stats: TransferStats) {
        let _ = self.tx.send(stats);
    }
}

/// Reporter-side handle: samples the latest snapshot on demand.
#[derive(Debug)]
pub struct StatsFeed {
    rx: watch::Receiver<TransferStats>,
}

impl StatsFeed {
    /// Returns the most recently published snapshot.
    pub fn latest(&mut self) -> TransferStats {
        *self.rx.borrow_and_update()
    }

    /// True once the publisher has been dropped and everything published has
    /// been observed via [`latest`](Self::latest).
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bytes: u64, blocks: u64, secs: u64) -> TransferStats {
        TransferStats {
            bytes,
            blocks,
            elapsed: Duration::from_secs(secs),
            ..Default::default()
        }
    }

    #[test]
    fn test_since_pairwise_difference() {
        let a = TransferStats {
            bytes: 500,
            blocks: 5,
            elapsed: Duration::from_secs(3),
            overhead: Duration::from_millis(30),
            repeats: 4,
            dropped: 2,
        };
        let b = TransferStats {
            bytes: 100,
            blocks: 1,
            elapsed: Duration::from_secs(1),
            overhead: Duration::from_millis(10),
            repeats: 1,
            dropped: 0,
        };

        let d = a.since(&b);
        assert_eq!(d.bytes, 400);
        assert_eq!(d.blocks, 4);
        assert_eq!(d.elapsed, Duration::from_secs(2));
        assert_eq!(d.overhead, Duration::from_millis(20));
        assert_eq!(d.repeats, 3);
        assert_eq!(d.dropped, 2);
    }

    #[test]
    fn test_since_zero_width_window() {
        let s = snapshot(12345, 12, 7);
        assert_eq!(s.since(&s), TransferStats::default());
    }

    #[test]
    fn test_bits_per_second() {
        let s = snapshot(1_000_000, 100, 1);
        assert_eq!(s.bits_per_second(), 8_000_000.0);
    }

    #[test]
    fn test_bits_per_second_zero_elapsed() {
        let s = snapshot(1_000_000, 100, 0);
        assert_eq!(s.bits_per_second(), 0.0);
    }

    #[test]
    fn test_windowed_rate_example() {
        let first = snapshot(1_000_000, 100, 1);
        let second = snapshot(3_000_000, 300, 2);

        let window = second.since(&first);
        assert_eq!(window.bytes, 2_000_000);
        assert_eq!(window.elapsed, Duration::from_secs(1));
        assert_eq!(window.bits_per_second(), 16_000_000.0);
    }

    #[test]
    fn test_feed_sees_latest_only() {
        let (publisher, mut feed) = stats_channel();

        publisher.publish(snapshot(100, 1, 1));
        publisher.publish(snapshot(200, 2, 2));

        assert_eq!(feed.latest().bytes, 200);
        assert!(!feed.is_closed());
    }

    #[test]
    fn test_feed_closed_after_publisher_drop() {
        let (publisher, mut feed) = stats_channel();
        publisher.publish(snapshot(100, 1, 1));
        drop(publisher);

        // The final snapshot is still observable, then the feed reads closed.
        assert_eq!(feed.latest().bytes, 100);
        assert!(feed.is_closed());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn stats_strategy() -> impl Strategy<Value = TransferStats> {
            (
                0u64..1u64 << 40,
                0u64..1u64 << 30,
                0u64..86_400,
                0u64..3_600_000,
                0u64..1u64 << 20,
                0u64..1u64 << 20,
            )
                .prop_map(|(bytes, blocks, secs, over_ms, repeats, dropped)| {
                    TransferStats {
                        bytes,
                        blocks,
                        elapsed: Duration::from_secs(secs),
                        overhead: Duration::from_millis(over_ms),
                        repeats,
                        dropped,
                    }
                })
        }

        proptest! {
            /// An ordered pair recomposes: earlier + since == later.
            #[test]
            fn prop_since_recomposes(a in stats_strategy(), b in stats_strategy()) {
                let (earlier, later) = sorted(a, b);
                let d = later.since(&earlier);
                prop_assert_eq!(earlier.bytes + d.bytes, later.bytes);
                prop_assert_eq!(earlier.blocks + d.blocks, later.blocks);
                prop_assert_eq!(earlier.elapsed + d.elapsed, later.elapsed);
            }

            /// since never panics, ordered or not.
            #[test]
            fn prop_since_total(a in stats_strategy(), b in stats_strategy()) {
                let _ = a.since(&b);
                let _ = b.since(&a);
            }
        }

        /// Field-wise min/max so the pair is genuinely ordered.
        fn sorted(a: TransferStats, b: TransferStats) -> (TransferStats, TransferStats) {
            let lo = TransferStats {
                bytes: a.bytes.min(b.bytes),
                blocks: a.blocks.min(b.blocks),
                elapsed: a.elapsed.min(b.elapsed),
                overhead: a.overhead.min(b.overhead),
                repeats: a.repeats.min(b.repeats),
                dropped: a.dropped.min(b.dropped),
            };
            let hi = TransferStats {
                bytes: a.bytes.max(b.bytes),
                blocks: a.blocks.max(b.blocks),
                elapsed: a.elapsed.max(b.elapsed),
                overhead: a.overhead.max(b.overhead),
                repeats: a.repeats.max(b.repeats),
                dropped: a.dropped.max(b.dropped),
            };
            (lo, hi)
        }
    }
}

//! Periodic throughput reporting, off the hot path.
//!
//! The reporter runs as its own task, woken on a fixed interval. On each
//! wake it samples the latest stats snapshot, computes the delta since the
//! previous tick and emits one human-readable line. It is purely
//! observational: it never feeds back into the transfer loop and never
//! raises errors; a degenerate snapshot (nothing elapsed yet) is skipped.
//!
//! Lines go through an injected [`ReportSink`] rather than a global print,
//! so callers decide where output lands (stdout in the binary, a capture
//! buffer in tests).

use crate::stats::{StatsFeed, TransferStats};
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Destination for formatted report lines.
pub trait ReportSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Default sink: one line per window on stdout.
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn line(&self, line: &str) {
        println!("{}", line);
    }
}

/// Runs the reporting loop for one session.
///
/// Every `interval`: sample the feed; while the session is live, emit the
/// windowed delta since the previous tick. Once the publisher is gone the
/// reporter flushes one final cumulative line and returns. Ticks that land
/// before any transfer time has elapsed, or on an unchanged snapshot, emit
/// nothing.
pub async fn report(
    mut feed: StatsFeed,
    interval: Duration,
    sink: Arc<dyn ReportSink>,
    label: String,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately.
    ticker.tick().await;

    let mut last = TransferStats::default();
    loop {
        ticker.tick().await;

        let snapshot = feed.latest();
        if feed.is_closed() {
            if snapshot.blocks > 0 {
                sink.line(&format_total(&label, &snapshot));
            }
            debug!("{}: reporter finished", label);
            return;
        }
        if snapshot.elapsed.is_zero() {
            // Session has not moved any data yet.
            continue;
        }

        let window = snapshot.since(&last);
        last = snapshot;
        if window.elapsed.is_zero() {
            continue;
        }
        sink.line(&format_window(&label, &window));
    }
}

/// One windowed report line.
///
/// ```text
/// client 10.0.0.2:41832: 118.1 MB in 1.00s: 944.5 Mbit/s  [1.8 k blocks, 0 repeats, 0 drops, 1.2ms overhead]
/// ```
pub fn format_window(label: &str, window: &TransferStats) -> String {
    format!(
        "{}: {} in {:.2?}: {}  [{} blocks, {} repeats, {} drops, {:.1?} overhead]",
        label,
        human_bytes(window.bytes),
        window.elapsed,
        human_bits_per_sec(window.bits_per_second()),
        human_count(window.blocks),
        window.repeats,
        window.dropped,
        window.overhead,
    )
}

/// The cumulative line flushed when a session ends.
pub fn format_total(label: &str, total: &TransferStats) -> String {
    format!(
        "{}: total {} in {:.2?}: {}  [{} blocks, {} repeats, {} drops, {:.1?} overhead]",
        label,
        human_bytes(total.bytes),
        total.elapsed,
        human_bits_per_sec(total.bits_per_second()),
        human_count(total.blocks),
        total.repeats,
        total.dropped,
        total.overhead,
    )
}

/// Formats a byte count with a decimal K/M/G prefix.
pub fn human_bytes(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.1} GB", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.1} MB", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1} kB", n as f64 / 1_000.0)
    } else {
        format!("{} B", n)
    }
}

/// Formats a bit rate with a decimal K/M/G prefix.
pub fn human_bits_per_sec(bps: f64) -> String {
    if bps >= 1_000_000_000.0 {
        format!("{:.1} Gbit/s", bps / 1_000_000_000.0)
    } else if bps >= 1_000_000.0 {
        format!("{:.1} Mbit/s", bps / 1_000_000.0)
    } else if bps >= 1_000.0 {
        format!("{:.1} kbit/s", bps / 1_000.0)
    } else {
        format!("{:.0} bit/s", bps)
    }
}

/// Formats a plain count with a decimal k/M prefix.
pub fn human_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1} M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1} k", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::stats_channel;
    use parking_lot::Mutex;

    /// Collects emitted lines for inspection.
    struct MemorySink {
        lines: Mutex<Vec<String>>,
    }

    impl MemorySink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                lines: Mutex::new(Vec::new()),
            })
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().clone()
        }
    }

    impl ReportSink for MemorySink {
        fn line(&self, line: &str) {
            self.lines.lock().push(line.to_string());
        }
    }

    fn snapshot(bytes: u64, blocks: u64, secs: u64) -> TransferStats {
        TransferStats {
            bytes,
            blocks,
            elapsed: Duration::from_secs(secs),
            ..Default::default()
        }
    }

    #[test]
    fn test_human_bytes_scaling() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(10_240), "10.2 kB");
        assert_eq!(human_bytes(2_000_000), "2.0 MB");
        assert_eq!(human_bytes(3_500_000_000), "3.5 GB");
    }

    #[test]
    fn test_human_bits_per_sec_scaling() {
        assert_eq!(human_bits_per_sec(800.0), "800 bit/s");
        assert_eq!(human_bits_per_sec(16_000_000.0), "16.0 Mbit/s");
        assert_eq!(human_bits_per_sec(1_200_000_000.0), "1.2 Gbit/s");
    }

    #[test]
    fn test_human_count_scaling() {
        assert_eq!(human_count(999), "999");
        assert_eq!(human_count(1_800), "1.8 k");
        assert_eq!(human_count(2_500_000), "2.5 M");
    }

    #[test]
    fn test_window_line_derives_rate() {
        // 2 MB over one second is 16 Mbit/s.
        let first = snapshot(1_000_000, 100, 1);
        let second = snapshot(3_000_000, 300, 2);
        let window = second.since(&first);

        let line = format_window("test", &window);
        assert!(line.contains("2.0 MB"), "line: {}", line);
        assert!(line.contains("16.0 Mbit/s"), "line: {}", line);
        assert!(line.contains("200 blocks"), "line: {}", line);
    }

    #[tokio::test]
    async fn test_reporter_windows_and_final_flush() {
        let (publisher, feed) = stats_channel();
        let sink = MemorySink::new();

        let handle = tokio::spawn(report(
            feed,
            Duration::from_millis(20),
            sink.clone(),
            "session".to_string(),
        ));

        publisher.publish(snapshot(1_000_000, 100, 1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        publisher.publish(snapshot(3_000_000, 300, 2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(publisher);

        handle.await.unwrap();

        let lines = sink.lines();
        assert!(lines.len() >= 2, "lines: {:?}", lines);
        // The second window is 2 MB over one second of transfer time.
        assert!(
            lines.iter().any(|l| l.contains("16.0 Mbit/s")),
            "lines: {:?}",
            lines
        );
        // Last line is the cumulative flush.
        let last = lines.last().unwrap();
        assert!(last.contains("total 3.0 MB"), "last line: {}", last);
    }

    #[tokio::test]
    async fn test_reporter_skips_idle_session() {
        // Publisher never publishes anything: no lines at all, not even a
        // final one.
        let (publisher, feed) = stats_channel();
        let sink = MemorySink::new();

        let handle = tokio::spawn(report(
            feed,
            Duration::from_millis(10),
            sink.clone(),
            "idle".to_string(),
        ));

        tokio::time::sleep(Duration::from_millis(35)).await;
        drop(publisher);
        handle.await.unwrap();

        assert!(sink.lines().is_empty());
    }
}

/// Inbound ordering and outbound timestamps
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Last-write-wins watermark for inbound snapshots
///
/// A snapshot is applied only if its timestamp is strictly greater than the
/// last applied one. The watermark is a single atomic, so acceptance can be
/// decided from a delivery callback without any further locking.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    last_applied: Arc<AtomicU64>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to advance the watermark to `timestamp`
    ///
    /// Returns true if the snapshot should be applied.
    pub fn accept(&self, timestamp: u64) -> bool {
        self.last_applied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                (timestamp > last).then_some(timestamp)
            })
            .is_ok()
    }

    /// Timestamp of the last applied snapshot, 0 if none
    pub fn last_applied(&self) -> u64 {
        self.last_applied.load(Ordering::Acquire)
    }
}

/// Strictly increasing timestamps for one sender
///
/// Wall-clock milliseconds, bumped by one whenever the clock did not move
/// (or moved backwards) since the previous stamp.
#[derive(Debug, Default)]
pub struct TimestampSource {
    last: u64,
}

impl TimestampSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp given the current wall-clock time
    pub fn next(&mut self, now_ms: u64) -> u64 {
        self.last = now_ms.max(self.last + 1);
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_order_snapshot_is_discarded() {
        let reconciler = Reconciler::new();
        let applied: Vec<bool> = [100, 80, 120].iter().map(|ts| reconciler.accept(*ts)).collect();
        assert_eq!(applied, vec![true, false, true]);
        assert_eq!(reconciler.last_applied(), 120);
    }

    #[test]
    fn test_equal_timestamp_is_discarded() {
        let reconciler = Reconciler::new();
        assert!(reconciler.accept(5));
        assert!(!reconciler.accept(5));
    }

    #[test]
    fn test_watermark_shared_between_clones() {
        let reconciler = Reconciler::new();
        let other = reconciler.clone();
        assert!(reconciler.accept(10));
        assert!(!other.accept(9));
        assert_eq!(other.last_applied(), 10);
    }

    #[test]
    fn test_concurrent_accepts_apply_each_timestamp_once() {
        let reconciler = Reconciler::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = reconciler.clone();
                std::thread::spawn(move || (1..=1000u64).filter(|ts| r.accept(*ts)).count())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(total <= 1000);
        assert_eq!(reconciler.last_applied(), 1000);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut source = TimestampSource::new();
        assert_eq!(source.next(1000), 1000);
        assert_eq!(source.next(1000), 1001);
        assert_eq!(source.next(900), 1002);
        assert_eq!(source.next(2000), 2000);
    }
}

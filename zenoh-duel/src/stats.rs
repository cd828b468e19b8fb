//! Statistics tracking for snapshot traffic

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Point-in-time view of the sync traffic of one player
#[derive(Debug, Clone)]
pub struct SyncStats {
    /// Total bytes received (inbound snapshots)
    pub input_bytes: u64,
    /// Total bytes sent (outbound snapshots)
    pub output_bytes: u64,
    /// Snapshots published
    pub sent: u64,
    /// Snapshots accepted by reconciliation
    pub applied: u64,
    /// Snapshots discarded as stale or duplicate
    pub stale: u64,
    /// Snapshots that failed to decode
    pub malformed: u64,
    /// Publish or receive failures
    pub transport_errors: u64,
    /// Whether the last transport operation failed
    pub degraded: bool,
    /// Timestamp when stats collection started
    pub start_time: Instant,
    /// Input throughput in KB/s
    pub input_kbps: f64,
    /// Output throughput in KB/s
    pub output_kbps: f64,
}

impl SyncStats {
    /// Update throughput calculations based on elapsed time
    pub fn update_throughput(&mut self) {
        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        if elapsed_secs > 0.0 {
            self.input_kbps = (self.input_bytes as f64) / 1024.0 / elapsed_secs;
            self.output_kbps = (self.output_bytes as f64) / 1024.0 / elapsed_secs;
        }
    }

    /// Connectivity-degraded indicator for presentation layers
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "In: {:.2} KB/s, Out: {:.2} KB/s, sent {}, applied {}, stale {}, bad {}{}",
            self.input_kbps,
            self.output_kbps,
            self.sent,
            self.applied,
            self.stale,
            self.malformed,
            if self.degraded { " [degraded]" } else { "" }
        )
    }
}

/// Thread-safe statistics tracker
///
/// Uses atomic operations so transport callbacks can count without locking
#[derive(Debug, Clone)]
pub struct StatsTracker {
    input_bytes: Arc<AtomicU64>,
    output_bytes: Arc<AtomicU64>,
    sent: Arc<AtomicU64>,
    applied: Arc<AtomicU64>,
    stale: Arc<AtomicU64>,
    malformed: Arc<AtomicU64>,
    transport_errors: Arc<AtomicU64>,
    degraded: Arc<AtomicBool>,
    start_time: Instant,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            input_bytes: Arc::new(AtomicU64::new(0)),
            output_bytes: Arc::new(AtomicU64::new(0)),
            sent: Arc::new(AtomicU64::new(0)),
            applied: Arc::new(AtomicU64::new(0)),
            stale: Arc::new(AtomicU64::new(0)),
            malformed: Arc::new(AtomicU64::new(0)),
            transport_errors: Arc::new(AtomicU64::new(0)),
            degraded: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
        }
    }

    pub fn add_input_bytes(&self, bytes: usize) {
        self.input_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count a successful publish; clears the degraded flag
    pub fn record_sent(&self, bytes: usize) {
        self.output_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.degraded.store(false, Ordering::Relaxed);
    }

    pub fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a transport failure; sets the degraded flag
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        self.degraded.store(true, Ordering::Relaxed);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Get current statistics snapshot
    pub fn get_stats(&self) -> SyncStats {
        let mut stats = SyncStats {
            input_bytes: self.input_bytes.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            start_time: self.start_time,
            input_kbps: 0.0,
            output_kbps: 0.0,
        };
        stats.update_throughput();
        stats
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts() {
        let tracker = StatsTracker::new();
        tracker.add_input_bytes(1024);
        tracker.record_sent(2048);
        tracker.record_applied();
        tracker.record_stale();
        tracker.record_stale();
        tracker.record_malformed();

        let stats = tracker.get_stats();
        assert_eq!(stats.input_bytes, 1024);
        assert_eq!(stats.output_bytes, 2048);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.stale, 2);
        assert_eq!(stats.malformed, 1);
        assert!(!stats.is_degraded());
    }

    #[test]
    fn test_degraded_flag_follows_last_outcome() {
        let tracker = StatsTracker::new();
        tracker.record_transport_error();
        assert!(tracker.is_degraded());
        assert_eq!(tracker.get_stats().transport_errors, 1);
        tracker.record_sent(10);
        assert!(!tracker.is_degraded());
    }

    #[test]
    fn test_stats_display() {
        let tracker = StatsTracker::new();
        tracker.record_transport_error();
        let display = format!("{}", tracker.get_stats());
        assert!(display.contains("KB/s"));
        assert!(display.contains("[degraded]"));
    }
}

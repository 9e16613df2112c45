//! Counters for the tracker, the server and individual sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters updated by [`VendorTracker`](crate::registry::VendorTracker)
#[derive(Debug, Default)]
pub struct TrackerMetrics {
    updates_applied: AtomicU64,
    updates_rejected: AtomicU64,
    events_published: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    queries: AtomicU64,
    vendors_expired: AtomicU64,
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fanout(&self, delivered: usize, failed: usize) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self) {
        self.vendors_expired.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> TrackerStats {
        TrackerStats {
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            updates_rejected: self.updates_rejected.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            vendors_expired: self.vendors_expired.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of tracker counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Vendor updates that changed state
    pub updates_applied: u64,
    /// Vendor updates rejected (invalid input, not online)
    pub updates_rejected: u64,
    /// Events fanned out
    pub events_published: u64,
    /// Successful per-viewer deliveries
    pub deliveries: u64,
    /// Per-viewer deliveries that failed
    pub delivery_failures: u64,
    /// Proximity queries answered
    pub queries: u64,
    /// Vendors taken offline by the stale sweep
    pub vendors_expired: u64,
}

/// Session-level statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Frames received from the peer
    pub frames_received: u64,
    /// Frames sent to the peer
    pub frames_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Broadcast events forwarded to this session
    pub events_forwarded: u64,
    /// Connection duration
    pub duration: Duration,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average frames per second received over the session
    pub fn receive_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_received as f64 / secs
        } else {
            0.0
        }
    }
}

/// Server-wide statistics
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn rejected_connections(&self) -> u64 {
        self.rejected_connections.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_metrics_snapshot() {
        let metrics = TrackerMetrics::new();
        metrics.record_applied();
        metrics.record_applied();
        metrics.record_rejected();
        metrics.record_fanout(3, 1);
        metrics.record_query();
        metrics.record_expired();

        let stats = metrics.snapshot();
        assert_eq!(stats.updates_applied, 2);
        assert_eq!(stats.updates_rejected, 1);
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.deliveries, 3);
        assert_eq!(stats.delivery_failures, 1);
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.vendors_expired, 1);
    }

    #[test]
    fn test_session_stats_receive_rate() {
        let mut stats = SessionStats::new();
        stats.frames_received = 100;
        stats.duration = Duration::from_secs(10);

        assert_eq!(stats.receive_rate(), 10.0);
    }

    #[test]
    fn test_session_stats_receive_rate_zero_duration() {
        let mut stats = SessionStats::new();
        stats.frames_received = 100;

        assert_eq!(stats.receive_rate(), 0.0);
    }

    #[test]
    fn test_server_stats_connections() {
        let stats = ServerStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        stats.connection_rejected();

        assert_eq!(stats.total_connections(), 2);
        assert_eq!(stats.active_connections(), 1);
        assert_eq!(stats.rejected_connections(), 1);
    }
}

//! In-process counters for schema-change statements.
//!
//! Counters are lock-free so statement handlers can update them without
//! coordinating with each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Aggregated counters for schema-change requests.
#[derive(Debug, Default)]
pub struct SchemaChangeMetrics {
    /// Number of statements received.
    requests: AtomicU64,
    /// Number of statements rejected by the access check.
    unauthorized: AtomicU64,
    /// Number of statements rejected as invalid.
    rejected: AtomicU64,
    /// Number of statements that resolved to an `IF NOT EXISTS` no-op.
    noops: AtomicU64,
    /// Number of schema updates accepted by the migration coordinator.
    announced: AtomicU64,
    /// Number of announcements that failed or timed out.
    announce_failures: AtomicU64,
    /// Sum of announcement latency in nanoseconds.
    announce_latency_ns_total: AtomicU64,
}

/// Immutable snapshot view of [`SchemaChangeMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaChangeMetricsSnapshot {
    pub requests: u64,
    pub unauthorized: u64,
    pub rejected: u64,
    pub noops: u64,
    pub announced: u64,
    pub announce_failures: u64,
    pub announce_latency_ns_total: u64,
}

impl SchemaChangeMetrics {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_noop(&self) {
        self.noops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_announced(&self, latency: Duration) {
        self.announced.fetch_add(1, Ordering::Relaxed);
        self.record_announce_latency(latency);
    }

    pub fn record_announce_failure(&self, latency: Duration) {
        self.announce_failures.fetch_add(1, Ordering::Relaxed);
        self.record_announce_latency(latency);
    }

    fn record_announce_latency(&self, latency: Duration) {
        let nanos = latency.as_nanos().min(u128::from(u64::MAX)) as u64;
        self.announce_latency_ns_total
            .fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchemaChangeMetricsSnapshot {
        SchemaChangeMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            noops: self.noops.load(Ordering::Relaxed),
            announced: self.announced.load(Ordering::Relaxed),
            announce_failures: self.announce_failures.load(Ordering::Relaxed),
            announce_latency_ns_total: self.announce_latency_ns_total.load(Ordering::Relaxed),
        }
    }

    /// Renders counters in Prometheus text exposition format.
    pub fn render_text(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        for (name, value) in [
            ("holo_schema_change_requests_total", snapshot.requests),
            ("holo_schema_change_unauthorized_total", snapshot.unauthorized),
            ("holo_schema_change_rejected_total", snapshot.rejected),
            ("holo_schema_change_noop_total", snapshot.noops),
            ("holo_schema_change_announced_total", snapshot.announced),
            (
                "holo_schema_change_announce_failures_total",
                snapshot.announce_failures,
            ),
            (
                "holo_schema_change_announce_latency_ns_total",
                snapshot.announce_latency_ns_total,
            ),
        ] {
            out.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announce_latency_accumulates_for_success_and_failure() {
        let metrics = SchemaChangeMetrics::default();
        metrics.record_request();
        metrics.record_announced(Duration::from_nanos(40));
        metrics.record_announce_failure(Duration::from_nanos(2));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.announced, 1);
        assert_eq!(snapshot.announce_failures, 1);
        assert_eq!(snapshot.announce_latency_ns_total, 42);
    }

    #[test]
    fn render_text_lists_every_counter() {
        let metrics = SchemaChangeMetrics::default();
        metrics.record_noop();
        let text = metrics.render_text();
        assert!(text.contains("holo_schema_change_noop_total 1\n"));
        assert_eq!(text.matches("# TYPE").count(), 7);
    }
}

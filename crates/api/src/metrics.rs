use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use index::IndexReport;

/// Request and indexing counters for the stats surface.
pub struct Metrics {
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    total_chat_time_us: AtomicU64,
    total_index_time_us: AtomicU64,

    books_indexed: AtomicUsize,
    segments_indexed: AtomicUsize,
    characters_profiled: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_chat_time_us: AtomicU64::new(0),
            total_index_time_us: AtomicU64::new(0),
            books_indexed: AtomicUsize::new(0),
            segments_indexed: AtomicUsize::new(0),
            characters_profiled: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_chat(&self, duration: std::time::Duration) {
        self.total_chat_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_index(&self, duration: std::time::Duration, report: &IndexReport) {
        self.total_index_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.books_indexed.fetch_add(1, Ordering::Relaxed);
        self.segments_indexed
            .fetch_add(report.segments, Ordering::Relaxed);
        self.characters_profiled
            .fetch_add(report.characters_profiled, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let chat_us = self.total_chat_time_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_chat_time_ms: if total > 0 {
                chat_us as f64 / total as f64 / 1000.0
            } else {
                0.0
            },
            total_index_time_ms: self.total_index_time_us.load(Ordering::Relaxed) as f64 / 1000.0,
            books_indexed: self.books_indexed.load(Ordering::Relaxed),
            segments_indexed: self.segments_indexed.load(Ordering::Relaxed),
            characters_profiled: self.characters_profiled.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_chat_time_ms: f64,
    pub total_index_time_ms: f64,
    pub books_indexed: usize,
    pub segments_indexed: usize,
    pub characters_profiled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_snapshot_reflects_recorded_requests() {
        let metrics = Metrics::new();
        metrics.record_request(true);
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_chat(Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert!(snapshot.avg_chat_time_ms > 0.0);
    }

    #[test]
    fn test_record_index_accumulates_report_counts() {
        let metrics = Metrics::new();
        let report = IndexReport {
            segments: 12,
            characters_found: 5,
            characters_profiled: 4,
            aliases_merged: 1,
            segments_embedded: 12,
        };
        metrics.record_index(Duration::from_secs(1), &report);
        metrics.record_index(Duration::from_secs(1), &report);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.books_indexed, 2);
        assert_eq!(snapshot.segments_indexed, 24);
        assert_eq!(snapshot.characters_profiled, 8);
    }
}

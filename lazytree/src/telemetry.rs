//! Update engine telemetry.
//!
//! Lock-free counters recorded by the viewer, the batch and the update
//! variants, with a point-in-time snapshot for reporting.
//!
//! ```text
//! viewer / updates ─────► UpdateMetrics ─────► MetricsSnapshot ─────► CLI (JSON)
//!                         (atomic counters)    (point-in-time copy)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Counters for the update engine.
#[derive(Debug)]
pub struct UpdateMetrics {
    scheduled: AtomicU64,
    coalesced: AtomicU64,
    started: AtomicU64,
    provider_calls: AtomicU64,
    completed: AtomicU64,
    canceled: AtomicU64,
    failed: AtomicU64,
    commits: AtomicU64,
    filter_passes: AtomicU64,
    apply_panics: AtomicU64,
    created_at: Instant,
}

impl UpdateMetrics {
    pub fn new() -> Self {
        Self {
            scheduled: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            started: AtomicU64::new(0),
            provider_calls: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            canceled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            filter_passes: AtomicU64::new(0),
            apply_panics: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    pub fn update_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// A scheduled update was absorbed by a waiting one.
    pub fn update_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// An update finished cleanup with an OK status.
    pub fn update_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_canceled(&self) {
        self.canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_committed(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn filter_pass(&self) {
        self.filter_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn apply_panicked(&self) {
        self.apply_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            filter_passes: self.filter_passes.load(Ordering::Relaxed),
            apply_panics: self.apply_panics.load(Ordering::Relaxed),
            uptime_ms: self.created_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for UpdateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`UpdateMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub scheduled: u64,
    pub coalesced: u64,
    pub started: u64,
    pub provider_calls: u64,
    pub completed: u64,
    pub canceled: u64,
    pub failed: u64,
    pub commits: u64,
    pub filter_passes: u64,
    pub apply_panics: u64,
    pub uptime_ms: u64,
}

impl MetricsSnapshot {
    /// Updates that started but have not finished cleanup.
    pub fn in_flight(&self) -> u64 {
        self.started
            .saturating_sub(self.completed + self.canceled + self.failed)
    }

    /// Average number of updates answered per provider call.
    pub fn batching_ratio(&self) -> f64 {
        if self.provider_calls == 0 {
            0.0
        } else {
            self.started as f64 / self.provider_calls as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = UpdateMetrics::new();
        metrics.update_scheduled();
        metrics.update_scheduled();
        metrics.update_coalesced();
        metrics.update_started();
        metrics.update_started();
        metrics.provider_call();
        metrics.update_completed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.scheduled, 2);
        assert_eq!(snapshot.coalesced, 1);
        assert_eq!(snapshot.in_flight(), 1);
        assert!((snapshot.batching_ratio() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(UpdateMetrics::new().snapshot()).unwrap();
        assert_eq!(json["commits"], 0);
        assert!(json.get("provider_calls").is_some());
    }
}

//! Metrics and observability for batchers.

use crate::batcher::Trigger;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Point-in-time counters of one batcher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatcherStats {
    /// Items accepted by `submit`
    pub submitted: u64,
    /// Items withdrawn before they were batched
    pub cancelled: u64,
    /// Batches closed by the coordinator
    pub batches_formed: u64,
    /// Batches whose every item received a failure
    pub batches_failed: u64,
    /// Items that received a success value
    pub items_succeeded: u64,
    /// Items that received a batch failure
    pub items_failed: u64,
    /// Results whose caller had already dropped its handle
    pub abandoned: u64,
    /// Items currently waiting to be batched
    pub pending: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    cancelled: AtomicU64,
    batches_formed: AtomicU64,
    batches_failed: AtomicU64,
    items_succeeded: AtomicU64,
    items_failed: AtomicU64,
    abandoned: AtomicU64,
    pending: AtomicU64,
}

/// Metrics collector for a batcher
///
/// Records through the `metrics` facade (a no-op until the application
/// installs a recorder) and keeps local atomics for [`BatcherStats`].
#[derive(Debug, Clone)]
pub(crate) struct BatcherMetrics {
    /// Batcher name for labeling
    batcher: String,
    counters: Arc<Counters>,
}

impl BatcherMetrics {
    pub(crate) fn new(batcher: impl Into<String>) -> Self {
        Self::register_metrics();

        Self {
            batcher: batcher.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    fn register_metrics() {
        // Counters
        describe_counter!(
            "dynbatch_items_submitted_total",
            "Total number of items submitted to the batcher"
        );
        describe_counter!(
            "dynbatch_items_cancelled_total",
            "Total number of items withdrawn before batching"
        );
        describe_counter!(
            "dynbatch_batches_formed_total",
            "Total number of batches closed, by trigger"
        );
        describe_counter!(
            "dynbatch_batches_failed_total",
            "Total number of batches that failed, by error kind"
        );
        describe_counter!(
            "dynbatch_retries_total",
            "Total number of caller-side resubmissions"
        );
        describe_counter!(
            "dynbatch_results_abandoned_total",
            "Results delivered after the caller stopped waiting"
        );

        // Histograms
        describe_histogram!("dynbatch_batch_size", "Number of items in each batch");
        describe_histogram!(
            "dynbatch_queue_wait_seconds",
            "Time each item spent pending before its batch closed"
        );
        describe_histogram!(
            "dynbatch_execution_duration_seconds",
            "Time spent in the bulk processor per batch"
        );

        // Gauges
        describe_gauge!("dynbatch_pending_items", "Items waiting to be batched");
        describe_gauge!("dynbatch_inflight_batches", "Batches currently executing");
    }

    pub(crate) fn record_submitted(&self) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        counter!("dynbatch_items_submitted_total", "batcher" => self.batcher.clone()).increment(1);
    }

    pub(crate) fn record_cancelled(&self) {
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        counter!("dynbatch_items_cancelled_total", "batcher" => self.batcher.clone()).increment(1);
    }

    pub(crate) fn record_batch_formed(&self, trigger: Trigger, size: usize) {
        self.counters.batches_formed.fetch_add(1, Ordering::Relaxed);
        counter!(
            "dynbatch_batches_formed_total",
            "batcher" => self.batcher.clone(),
            "trigger" => trigger.as_str(),
        )
        .increment(1);
        histogram!("dynbatch_batch_size", "batcher" => self.batcher.clone()).record(size as f64);
    }

    pub(crate) fn record_queue_wait(&self, waited: Duration) {
        histogram!("dynbatch_queue_wait_seconds", "batcher" => self.batcher.clone())
            .record(waited.as_secs_f64());
    }

    pub(crate) fn record_batch_succeeded(&self, size: usize) {
        self.counters
            .items_succeeded
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_failed(&self, error_kind: &'static str, size: usize) {
        self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.counters
            .items_failed
            .fetch_add(size as u64, Ordering::Relaxed);
        counter!(
            "dynbatch_batches_failed_total",
            "batcher" => self.batcher.clone(),
            "error_kind" => error_kind,
        )
        .increment(1);
    }

    pub(crate) fn record_retry(&self) {
        counter!("dynbatch_retries_total", "batcher" => self.batcher.clone()).increment(1);
    }

    pub(crate) fn record_abandoned(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.counters
            .abandoned
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("dynbatch_results_abandoned_total", "batcher" => self.batcher.clone())
            .increment(count as u64);
    }

    pub(crate) fn set_pending(&self, count: usize) {
        self.counters.pending.store(count as u64, Ordering::Relaxed);
        gauge!("dynbatch_pending_items", "batcher" => self.batcher.clone()).set(count as f64);
    }

    fn record_execution_time(&self, duration: Duration) {
        histogram!("dynbatch_execution_duration_seconds", "batcher" => self.batcher.clone())
            .record(duration.as_secs_f64());
    }

    fn increment_inflight(&self) {
        gauge!("dynbatch_inflight_batches", "batcher" => self.batcher.clone()).increment(1.0);
    }

    fn decrement_inflight(&self) {
        gauge!("dynbatch_inflight_batches", "batcher" => self.batcher.clone()).decrement(1.0);
    }

    pub(crate) fn snapshot(&self) -> BatcherStats {
        let c = &self.counters;
        BatcherStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            batches_formed: c.batches_formed.load(Ordering::Relaxed),
            batches_failed: c.batches_failed.load(Ordering::Relaxed),
            items_succeeded: c.items_succeeded.load(Ordering::Relaxed),
            items_failed: c.items_failed.load(Ordering::Relaxed),
            abandoned: c.abandoned.load(Ordering::Relaxed),
            pending: c.pending.load(Ordering::Relaxed),
        }
    }
}

/// Tracks one batch execution; the in-flight gauge drops when it does
pub(crate) struct BatchTimer {
    start: Instant,
    metrics: BatcherMetrics,
}

impl BatchTimer {
    pub(crate) fn start(metrics: &BatcherMetrics) -> Self {
        metrics.increment_inflight();
        Self {
            start: Instant::now(),
            metrics: metrics.clone(),
        }
    }

    /// Record the execution time and return it
    pub(crate) fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.metrics.record_execution_time(elapsed);
        elapsed
    }
}

impl Drop for BatchTimer {
    fn drop(&mut self) {
        self.metrics.decrement_inflight();
    }
}

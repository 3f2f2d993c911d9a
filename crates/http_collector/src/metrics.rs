use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the collector's lifetime.
///
/// All methods use `Ordering::Relaxed`: these are statistics, no code path
/// branches on them and nothing else is published through them.
#[derive(Debug, Default)]
pub struct CollectorMetrics {
    spans_collected: AtomicU64,
    spans_dropped: AtomicU64,
    spans_exported: AtomicU64,
    batches_exported: AtomicU64,
    export_errors: AtomicU64,
    flushes_triggered: AtomicU64,
}

/// Point-in-time copy of [`CollectorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub spans_collected: u64,
    pub spans_dropped: u64,
    pub spans_exported: u64,
    pub batches_exported: u64,
    pub export_errors: u64,
    pub flushes_triggered: u64,
}

impl CollectorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans_collected(&self) -> u64 {
        self.spans_collected.load(Ordering::Relaxed)
    }

    pub fn spans_dropped(&self) -> u64 {
        self.spans_dropped.load(Ordering::Relaxed)
    }

    pub fn spans_exported(&self) -> u64 {
        self.spans_exported.load(Ordering::Relaxed)
    }

    pub fn batches_exported(&self) -> u64 {
        self.batches_exported.load(Ordering::Relaxed)
    }

    pub fn export_errors(&self) -> u64 {
        self.export_errors.load(Ordering::Relaxed)
    }

    pub fn flushes_triggered(&self) -> u64 {
        self.flushes_triggered.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            spans_collected: self.spans_collected(),
            spans_dropped: self.spans_dropped(),
            spans_exported: self.spans_exported(),
            batches_exported: self.batches_exported(),
            export_errors: self.export_errors(),
            flushes_triggered: self.flushes_triggered(),
        }
    }

    pub(crate) fn record_collected(&self) {
        self.spans_collected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: usize) {
        self.spans_dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self, span_count: usize) {
        self.spans_exported.fetch_add(span_count as u64, Ordering::Relaxed);
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.export_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trigger(&self) {
        self.flushes_triggered.fetch_add(1, Ordering::Relaxed);
    }
}

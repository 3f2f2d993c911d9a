//! Diagnostic sink for backlog drops and delivery failures.
//!
//! Neither event reaches the producer: `collect` only fails once the
//! collector is closed. The sink is where operators see them.

use crate::error::ExportError;
use tracing::{error, warn};

/// Receives the collector's non-fatal events.
pub trait DiagnosticSink: Send + Sync {
    /// The buffer exceeded its backlog and dropped `count` of its oldest spans.
    fn spans_dropped(&self, count: usize);

    /// A flush failed. The spans it carried stay buffered.
    fn flush_failed(&self, error: &ExportError);
}

/// Reports events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn spans_dropped(&self, count: usize) {
        warn!(count, "backlog too long, disposing spans");
    }

    fn flush_failed(&self, error: &ExportError) {
        error!(error = %error, "span batch delivery failed");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopSink;

impl DiagnosticSink for NopSink {
    fn spans_dropped(&self, _count: usize) {}

    fn flush_failed(&self, _error: &ExportError) {}
}

/// Sink that records events for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub(crate) dropped: std::sync::Mutex<Vec<usize>>,
    pub(crate) failures: std::sync::Mutex<Vec<ExportError>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn total_dropped(&self) -> usize {
        self.dropped.lock().unwrap().iter().sum()
    }

    pub(crate) fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

#[cfg(test)]
impl DiagnosticSink for RecordingSink {
    fn spans_dropped(&self, count: usize) {
        self.dropped.lock().unwrap().push(count);
    }

    fn flush_failed(&self, error: &ExportError) {
        self.failures.lock().unwrap().push(error.clone());
    }
}

//! Sender - one flush attempt at a time.
//!
//! `BatchSender` is the aggregate every internal task shares: the buffer,
//! both ports, the diagnostic sink and the metrics. The dispatch loop appends
//! through it and launches [`flush`](BatchSender::flush) calls; the flushes
//! themselves run as independent tasks.
//!
//! # Flush protocol
//!
//! 1. Acquire the send lock. A flush triggered while another is in flight
//!    waits here, then sends whatever accumulated in the meantime.
//! 2. Take the buffer contents (swap under the buffer lock). Empty → done.
//! 3. Encode and deliver with no buffer lock held, so producers keep
//!    appending during the network call.
//! 4. Success: nothing left to remove. Failure: report to the sink and
//!    requeue the spans at the head of the buffer for the next flush.

use crate::buffer::BatchBuffer;
use crate::diagnostics::DiagnosticSink;
use crate::encoder::SpanEncoder;
use crate::error::ExportError;
#[cfg(debug_assertions)]
use crate::invariants::debug_assert_single_send;
use crate::metrics::CollectorMetrics;
use crate::transport::{Payload, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// What a successful flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; no request was made
    Empty,
    /// This many spans were delivered
    Delivered(usize),
}

/// Shared state behind the collector: buffer, ports, sink and metrics.
pub struct BatchSender<E: SpanEncoder, T> {
    buffer: BatchBuffer<E::Span>,
    encoder: E,
    transport: T,
    sink: Arc<dyn DiagnosticSink>,
    metrics: Arc<CollectorMetrics>,
    /// Guards the single outstanding delivery
    send_lock: Mutex<()>,
    in_flight: AtomicUsize,
}

impl<E: SpanEncoder, T: Transport> BatchSender<E, T> {
    /// Creates a sender over an empty buffer bounded by `max_backlog`.
    pub fn new(
        max_backlog: usize,
        encoder: E,
        transport: T,
        sink: Arc<dyn DiagnosticSink>,
        metrics: Arc<CollectorMetrics>,
    ) -> Self {
        Self {
            buffer: BatchBuffer::new(max_backlog),
            encoder,
            transport,
            sink,
            metrics,
            send_lock: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Returns the pending-span buffer.
    pub fn buffer(&self) -> &BatchBuffer<E::Span> {
        &self.buffer
    }

    /// Returns the shared metrics.
    pub fn metrics(&self) -> &Arc<CollectorMetrics> {
        &self.metrics
    }

    /// Appends a span, reporting any backlog eviction. Returns the new length.
    pub fn append(&self, span: E::Span) -> usize {
        let appended = self.buffer.append(span);
        self.metrics.record_collected();
        if appended.evicted > 0 {
            self.report_dropped(appended.evicted);
        }
        appended.len
    }

    fn report_dropped(&self, count: usize) {
        self.metrics.record_dropped(count);
        self.sink.spans_dropped(count);
    }

    /// Runs one flush attempt.
    ///
    /// On failure the spans are back in the buffer (minus any the backlog
    /// forced out) and the error has already been reported to the sink.
    pub async fn flush(&self) -> Result<FlushOutcome, ExportError> {
        let _send_guard = self.send_lock.lock().await;

        let batch = self.buffer.take();
        if batch.is_empty() {
            trace!("flush skipped, buffer empty");
            return Ok(FlushOutcome::Empty);
        }

        let span_count = batch.len();
        let _previous = self.in_flight.fetch_add(1, Ordering::Relaxed);
        #[cfg(debug_assertions)]
        debug_assert_single_send!(_previous);

        let result = self.deliver(&batch).await;
        self.in_flight.fetch_sub(1, Ordering::Relaxed);

        match result {
            Ok(()) => {
                self.metrics.record_success(span_count);
                debug!(
                    spans = span_count,
                    transport = self.transport.name(),
                    "span batch delivered"
                );
                Ok(FlushOutcome::Delivered(span_count))
            }
            Err(e) => {
                self.metrics.record_error();
                let evicted = self.buffer.requeue(batch);
                if evicted > 0 {
                    self.report_dropped(evicted);
                }
                self.sink.flush_failed(&e);
                Err(e)
            }
        }
    }

    async fn deliver(&self, batch: &[E::Span]) -> Result<(), ExportError> {
        let body = self.encoder.encode(batch)?;
        let payload = Payload {
            body,
            content_type: self.encoder.content_type(),
            span_count: batch.len(),
        };
        self.transport.send(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::encoder::JsonEncoder;
    use std::sync::Mutex as StdMutex;

    /// Transport that records payloads and fails while `failing` is set.
    #[derive(Default)]
    struct ScriptedTransport {
        failing: std::sync::atomic::AtomicBool,
        bodies: StdMutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn bodies(&self) -> Vec<String> {
            self.bodies.lock().unwrap().clone()
        }
    }

    impl Transport for Arc<ScriptedTransport> {
        async fn send(&self, payload: Payload) -> Result<(), ExportError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ExportError::Transport("connection refused".to_string()));
            }
            let body = String::from_utf8(payload.body.to_vec()).unwrap();
            self.bodies.lock().unwrap().push(body);
            Ok(())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn sender(
        max_backlog: usize,
    ) -> (
        BatchSender<JsonEncoder<u32>, Arc<ScriptedTransport>>,
        Arc<ScriptedTransport>,
        Arc<RecordingSink>,
    ) {
        let transport = Arc::new(ScriptedTransport::default());
        let sink = Arc::new(RecordingSink::default());
        let sender = BatchSender::new(
            max_backlog,
            JsonEncoder::new(),
            Arc::clone(&transport),
            sink.clone(),
            Arc::new(CollectorMetrics::new()),
        );
        (sender, transport, sink)
    }

    #[tokio::test]
    async fn test_flush_empty_is_noop() {
        let (sender, transport, _sink) = sender(10);
        assert_eq!(sender.flush().await, Ok(FlushOutcome::Empty));
        assert!(transport.bodies().is_empty());
    }

    #[tokio::test]
    async fn test_flush_delivers_and_clears() {
        let (sender, transport, _sink) = sender(10);
        for i in 0..3 {
            sender.append(i);
        }

        assert_eq!(sender.flush().await, Ok(FlushOutcome::Delivered(3)));
        assert_eq!(transport.bodies(), vec!["[0,1,2]".to_string()]);
        assert!(sender.buffer().is_empty());
        assert_eq!(sender.metrics().spans_exported(), 3);
        assert_eq!(sender.metrics().batches_exported(), 1);
    }

    #[tokio::test]
    async fn test_failed_flush_retains_spans() {
        let (sender, transport, sink) = sender(10);
        sender.append(1);
        sender.append(2);

        transport.set_failing(true);
        let err = sender.flush().await.unwrap_err();
        assert!(matches!(err, ExportError::Transport(_)));
        assert_eq!(sender.buffer().snapshot_len(), 2);
        assert_eq!(sink.failure_count(), 1);
        assert_eq!(sender.metrics().export_errors(), 1);

        // Spans that arrive after the failure queue up behind the retained ones
        sender.append(3);
        transport.set_failing(false);
        assert_eq!(sender.flush().await, Ok(FlushOutcome::Delivered(3)));
        assert_eq!(transport.bodies(), vec!["[1,2,3]".to_string()]);
    }

    #[tokio::test]
    async fn test_append_reports_eviction() {
        let (sender, _transport, sink) = sender(2);
        for i in 0..5 {
            sender.append(i);
        }

        assert_eq!(sender.buffer().snapshot_len(), 2);
        assert_eq!(sink.total_dropped(), 3);
        assert_eq!(sender.metrics().spans_dropped(), 3);
        assert_eq!(sender.metrics().spans_collected(), 5);
    }
}

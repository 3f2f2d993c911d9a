//! Collector and its dispatch loop.
//!
//! The dispatch loop is the only task that decides when to flush. It
//! multiplexes three event sources with `tokio::select!`:
//!
//! - **Shutdown** (oneshot): drain and stop.
//! - **Tick** every `batch_interval / 10`: evaluate the deadline trigger.
//! - **Span arrival** on the inbox: append, then evaluate the count trigger.
//!
//! The select is biased in that order, so a continuously full inbox cannot
//! hold off shutdown or the deadline trigger.
//!
//! Triggered flushes are spawned into a `JoinSet` and never awaited by the
//! loop itself; the sender's lock keeps them to one delivery at a time.
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────┐  shutdown  ┌──────────┐  final flush  ┌─────────┐
//! │ Running │ ─────────► │ Draining │ ────────────► │ Stopped │
//! └─────────┘            └──────────┘               └─────────┘
//! ```
//!
//! Only `Running` accepts spans. `Draining` closes the inbox, moves spans
//! already accepted into the buffer, waits for in-flight flushes, then runs
//! one last flush and hands its result to [`Collector::close`].

use crate::config::CollectorConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::encoder::SpanEncoder;
use crate::error::{CollectorError, ConfigError, ExportError};
use crate::metrics::CollectorMetrics;
use crate::scheduler::{FlushSchedule, FlushTrigger};
use crate::sender::{BatchSender, FlushOutcome};
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Batching span exporter.
///
/// Must be created inside a Tokio runtime: construction spawns the dispatch
/// loop.
pub struct Collector<E: SpanEncoder, T: Transport> {
    inbox: mpsc::Sender<E::Span>,
    shutdown_tx: oneshot::Sender<()>,
    dispatch_task: JoinHandle<Result<(), ExportError>>,
    sender: Arc<BatchSender<E, T>>,
}

impl<E: SpanEncoder> Collector<E, HttpTransport> {
    /// Creates a collector that POSTs batches to `url`.
    pub fn http(url: &str, config: CollectorConfig, encoder: E) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(url, config.timeout)?;
        Self::new(config, encoder, transport)
    }
}

impl<E: SpanEncoder, T: Transport> Collector<E, T> {
    /// Creates a collector that reports through `tracing`.
    pub fn new(config: CollectorConfig, encoder: E, transport: T) -> Result<Self, ConfigError> {
        Self::with_sink(config, encoder, transport, Arc::new(TracingSink))
    }

    /// Creates a collector with a custom diagnostic sink.
    pub fn with_sink(
        config: CollectorConfig,
        encoder: E,
        transport: T,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let metrics = Arc::new(CollectorMetrics::new());
        let sender = Arc::new(BatchSender::new(
            config.max_backlog,
            encoder,
            transport,
            sink,
            metrics,
        ));

        let (inbox, inbox_rx) = mpsc::channel(config.inbox_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        debug!(
            batch_size = config.batch_size,
            batch_interval = ?config.batch_interval,
            max_backlog = config.max_backlog,
            "starting span collector"
        );

        let dispatch_task = tokio::spawn(dispatch(
            Arc::clone(&sender),
            inbox_rx,
            shutdown_rx,
            config,
        ));

        Ok(Self {
            inbox,
            shutdown_tx,
            dispatch_task,
            sender,
        })
    }

    /// Hands a span to the dispatch loop.
    ///
    /// Waits only for a free inbox slot, never for delivery. The span may
    /// still sit in the inbox when this returns; it is appended by the loop
    /// shortly after, or moved into the buffer during shutdown, so it is
    /// never lost. Delivery failures and backlog drops go to the diagnostic
    /// sink.
    pub async fn collect(&self, span: E::Span) -> Result<(), CollectorError> {
        self.inbox
            .send(span)
            .await
            .map_err(|_| CollectorError::Closed)
    }

    /// Returns a cloneable producer handle.
    pub fn handle(&self) -> SpanHandle<E::Span> {
        SpanHandle {
            inbox: self.inbox.clone(),
        }
    }

    /// Returns collector metrics.
    pub fn metrics(&self) -> &Arc<CollectorMetrics> {
        self.sender.metrics()
    }

    /// Returns the number of spans currently buffered (excluding any flush
    /// in flight).
    pub fn buffered(&self) -> usize {
        self.sender.buffer().snapshot_len()
    }

    /// Stops the collector after one final flush of everything buffered.
    ///
    /// Returns the final flush's error, if it failed.
    pub async fn close(self) -> Result<(), CollectorError> {
        let Self {
            inbox,
            shutdown_tx,
            dispatch_task,
            sender,
        } = self;
        drop(inbox);

        // The loop may already be gone if it panicked; join reports that.
        let _ = shutdown_tx.send(());

        let result = match dispatch_task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CollectorError::Shutdown(e)),
            Err(e) => Err(CollectorError::TaskFailed(e.to_string())),
        };

        let totals = sender.metrics().snapshot();
        info!(
            collected = totals.spans_collected,
            exported = totals.spans_exported,
            dropped = totals.spans_dropped,
            errors = totals.export_errors,
            "span collector stopped"
        );

        result
    }
}

/// Producer handle for submitting spans from many tasks or threads.
pub struct SpanHandle<S> {
    inbox: mpsc::Sender<S>,
}

impl<S> Clone for SpanHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
        }
    }
}

impl<S: Send + 'static> SpanHandle<S> {
    /// Hands a span to the dispatch loop.
    ///
    /// Same hand-off as [`Collector::collect`]: returns once the span is in
    /// the inbox, which may be before the loop has appended it.
    pub async fn collect(&self, span: S) -> Result<(), CollectorError> {
        self.inbox
            .send(span)
            .await
            .map_err(|_| CollectorError::Closed)
    }

    /// Blocking variant for threads outside the runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn collect_blocking(&self, span: S) -> Result<(), CollectorError> {
        self.inbox
            .blocking_send(span)
            .map_err(|_| CollectorError::Closed)
    }

    /// Returns `true` once the collector no longer accepts spans.
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}

/// The dispatch loop. Returns the final flush's result.
async fn dispatch<E: SpanEncoder, T: Transport>(
    sender: Arc<BatchSender<E, T>>,
    mut inbox: mpsc::Receiver<E::Span>,
    mut shutdown_rx: oneshot::Receiver<()>,
    config: CollectorConfig,
) -> Result<(), ExportError> {
    let tick_period = config.tick_period();
    let mut schedule = FlushSchedule::new(config.batch_size, config.batch_interval, Instant::now());
    let mut ticker = tokio::time::interval_at(Instant::now() + tick_period, tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut flushes: JoinSet<()> = JoinSet::new();

    // Running
    loop {
        tokio::select! {
            biased;

            // A dropped Collector closes the oneshot: drain just the same.
            _ = &mut shutdown_rx => break,

            // Ahead of the inbox: a saturated inbox must not starve the
            // deadline trigger.
            _ = ticker.tick() => {
                if let Some(trigger) = schedule.on_tick(Instant::now()) {
                    let len = sender.buffer().snapshot_len();
                    launch(&sender, &mut flushes, trigger, len);
                }
            }

            Some(joined) = flushes.join_next(), if !flushes.is_empty() => {
                reap(joined);
            }

            Some(span) = inbox.recv() => {
                let len = sender.append(span);
                if let Some(trigger) = schedule.on_append(len, Instant::now()) {
                    launch(&sender, &mut flushes, trigger, len);
                }
            }
        }
    }

    // Draining
    inbox.close();
    let mut accepted = 0usize;
    while let Ok(span) = inbox.try_recv() {
        sender.append(span);
        accepted += 1;
    }
    debug!(accepted, in_flight = flushes.len(), "draining span collector");

    while let Some(joined) = flushes.join_next().await {
        reap(joined);
    }

    let outcome = sender.flush().await;
    if let Ok(FlushOutcome::Delivered(count)) = outcome {
        debug!(spans = count, "final flush delivered");
    }

    // Stopped
    outcome.map(|_| ())
}

fn launch<E: SpanEncoder, T: Transport>(
    sender: &Arc<BatchSender<E, T>>,
    flushes: &mut JoinSet<()>,
    trigger: FlushTrigger,
    buffered: usize,
) {
    debug!(?trigger, buffered, "flush triggered");
    sender.metrics().record_trigger();

    let sender = Arc::clone(sender);
    flushes.spawn(async move {
        // Failures were already reported to the sink and the spans requeued.
        let _ = sender.flush().await;
    });
}

fn reap(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "flush task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::encoder::JsonEncoder;
    use crate::transport::Payload;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct TestTransport {
        batches: Mutex<Vec<Vec<u64>>>,
    }

    impl TestTransport {
        fn batches(&self) -> Vec<Vec<u64>> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl Transport for Arc<TestTransport> {
        async fn send(&self, payload: Payload) -> Result<(), ExportError> {
            let batch: Vec<u64> = serde_json::from_slice(&payload.body).unwrap();
            self.batches.lock().unwrap().push(batch);
            Ok(())
        }

        fn name(&self) -> &str {
            "test"
        }
    }

    struct DownTransport;

    impl Transport for DownTransport {
        async fn send(&self, _payload: Payload) -> Result<(), ExportError> {
            Err(ExportError::Status { status: 503 })
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn quiet_config() -> CollectorConfig {
        CollectorConfig::default()
            .with_batch_size(1000)
            .with_batch_interval(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_close_drains_buffer() {
        let transport = Arc::new(TestTransport::default());
        let collector =
            Collector::new(quiet_config(), JsonEncoder::<u64>::new(), Arc::clone(&transport)).unwrap();

        for i in 0..5 {
            collector.collect(i).await.unwrap();
        }

        collector.close().await.unwrap();
        assert_eq!(transport.batches(), vec![vec![0, 1, 2, 3, 4]]);
    }

    #[tokio::test]
    async fn test_close_reports_final_failure() {
        let sink = Arc::new(RecordingSink::default());
        let collector = Collector::with_sink(
            quiet_config(),
            JsonEncoder::<u64>::new(),
            DownTransport,
            sink.clone(),
        )
        .unwrap();

        collector.collect(1).await.unwrap();

        let err = collector.close().await.unwrap_err();
        assert_eq!(err.export_error(), Some(&ExportError::Status { status: 503 }));
        assert_eq!(sink.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_close_with_nothing_buffered() {
        let transport = Arc::new(TestTransport::default());
        let collector =
            Collector::new(quiet_config(), JsonEncoder::<u64>::new(), Arc::clone(&transport)).unwrap();

        collector.close().await.unwrap();
        assert!(transport.batches().is_empty());
    }

    #[tokio::test]
    async fn test_handle_rejects_after_close() {
        let transport = Arc::new(TestTransport::default());
        let collector =
            Collector::new(quiet_config(), JsonEncoder::<u64>::new(), Arc::clone(&transport)).unwrap();
        let handle = collector.handle();

        handle.collect(1).await.unwrap();
        collector.close().await.unwrap();

        assert!(handle.is_closed());
        assert!(matches!(handle.collect(2).await, Err(CollectorError::Closed)));
        assert_eq!(transport.batches(), vec![vec![1]]);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let transport = Arc::new(TestTransport::default());
        let result = Collector::new(
            quiet_config().with_batch_size(0),
            JsonEncoder::<u64>::new(),
            transport,
        );
        assert!(matches!(result, Err(ConfigError::Zero { field: "batch_size" })));
    }
}

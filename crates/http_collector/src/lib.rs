//! Batching HTTP Span Collector
//!
//! Accepts a continuous stream of spans from an instrumented application and
//! forwards them in batches to a remote collection endpoint, without making
//! producers wait on the network.
//!
//! # Features
//!
//! - **Dual flush triggers**: a batch is sent as soon as `batch_size` spans are
//!   buffered, or when `batch_interval` elapses, whichever comes first
//! - **Bounded backlog**: past `max_backlog` the oldest spans are dropped and
//!   reported to the diagnostic sink; producers never block on a full buffer
//! - **One delivery in flight**: sends are serialized, spans keep accumulating
//!   while a request is outstanding
//! - **Implicit retry**: a failed batch stays buffered and goes out with the
//!   next flush, ahead of newer spans
//! - **Graceful shutdown**: [`Collector::close`] performs a final flush and
//!   returns its result
//!
//! # Example
//!
//! ```ignore
//! use http_span_collector::{Collector, CollectorConfig, JsonEncoder};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CollectorConfig::default()
//!         .with_batch_size(50)
//!         .with_batch_interval(Duration::from_millis(500));
//!
//!     let collector = Collector::http(
//!         "http://localhost:9411/api/v2/spans",
//!         config,
//!         JsonEncoder::<MySpan>::new(),
//!     )?;
//!
//!     collector.collect(span).await?;
//!     collector.close().await?;
//!     Ok(())
//! }
//! ```

mod buffer;
mod collector;
mod config;
mod diagnostics;
mod encoder;
mod error;
mod invariants;
mod metrics;
mod scheduler;
mod sender;
mod transport;

pub use buffer::{Appended, BatchBuffer};
pub use collector::{Collector, SpanHandle};
pub use config::{
    CollectorConfig, DEFAULT_BATCH_INTERVAL, DEFAULT_BATCH_SIZE, DEFAULT_MAX_BACKLOG,
    DEFAULT_TIMEOUT,
};
pub use diagnostics::{DiagnosticSink, NopSink, TracingSink};
pub use encoder::{thrift, JsonEncoder, SpanEncoder, ThriftListEncoder, ThriftStruct};
pub use error::{CollectorError, ConfigError, ExportError};
pub use metrics::{CollectorMetrics, MetricsSnapshot};
pub use scheduler::{FlushSchedule, FlushTrigger};
pub use sender::{BatchSender, FlushOutcome};
pub use transport::{HttpTransport, Payload, Transport};

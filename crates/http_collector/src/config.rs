//! Configuration for the collector.

use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of buffered spans that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default maximum time spans wait before a flush.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(1);
/// Default capacity of the buffer before the oldest spans are dropped.
pub const DEFAULT_MAX_BACKLOG: usize = 1000;

/// The ticker never runs faster than this, whatever the batch interval.
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

const ENV_TIMEOUT_MS: &str = "SPAN_COLLECTOR_TIMEOUT_MS";
const ENV_BATCH_SIZE: &str = "SPAN_COLLECTOR_BATCH_SIZE";
const ENV_BATCH_INTERVAL_MS: &str = "SPAN_COLLECTOR_BATCH_INTERVAL_MS";
const ENV_MAX_BACKLOG: &str = "SPAN_COLLECTOR_MAX_BACKLOG";

/// Collector configuration, immutable once the collector is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Per-request deadline handed to the transport.
    ///
    /// Default: 5s
    pub timeout: Duration,

    /// Buffered span count at which a flush is launched immediately.
    ///
    /// Default: 100
    pub batch_size: usize,

    /// Maximum time between flushes when the count threshold is not reached.
    /// The dispatch loop checks the deadline every `batch_interval / 10`.
    ///
    /// Default: 1s
    pub batch_interval: Duration,

    /// Buffer capacity. Appending past it evicts the oldest spans.
    ///
    /// Default: 1000
    pub max_backlog: usize,

    /// Slots in the producer inbox. With the default of 1, `collect`
    /// returns as soon as the dispatch loop has room for the span.
    ///
    /// Default: 1
    pub inbox_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval: DEFAULT_BATCH_INTERVAL,
            max_backlog: DEFAULT_MAX_BACKLOG,
            inbox_capacity: 1,
        }
    }
}

impl CollectorConfig {
    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the count trigger threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the time trigger period.
    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    /// Sets the backlog capacity.
    pub fn with_max_backlog(mut self, max_backlog: usize) -> Self {
        self.max_backlog = max_backlog;
        self
    }

    /// Sets the producer inbox capacity.
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    /// Period of the dispatch loop's deadline check.
    #[inline]
    pub fn tick_period(&self) -> Duration {
        (self.batch_interval / 10).max(MIN_TICK_PERIOD)
    }

    /// Rejects settings the dispatch loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Zero { field: "batch_size" });
        }
        if self.max_backlog == 0 {
            return Err(ConfigError::Zero { field: "max_backlog" });
        }
        if self.batch_interval.is_zero() {
            return Err(ConfigError::Zero { field: "batch_interval" });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Zero { field: "timeout" });
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Zero { field: "inbox_capacity" });
        }
        Ok(())
    }

    /// Loads configuration from `SPAN_COLLECTOR_*` environment variables.
    ///
    /// Unset variables keep their defaults. Values that fail to parse are
    /// reported rather than ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_TIMEOUT_MS)? {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, ENV_BATCH_SIZE)? {
            config.batch_size = n;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_BATCH_INTERVAL_MS)? {
            config.batch_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, ENV_MAX_BACKLOG)? {
            config.max_backlog = n;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
    }
}

//! Flush Scheduler - decides when the dispatch loop launches a send.
//!
//! Two independent triggers can fire a flush:
//!
//! - **Count**: the buffer reached `batch_size` spans after an append.
//! - **Deadline**: the loop's periodic tick observed `now >= next_deadline`.
//!
//! Either trigger pushes the deadline to `now + batch_interval` before the
//! send is launched, so a burst that fires the count trigger does not cause a
//! second, deadline-driven flush right behind it.
//!
//! The schedule is owned by the dispatch loop and never shared; it needs no
//! synchronization.

use std::time::Duration;
use tokio::time::Instant;

/// Why a flush was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Buffer length reached the batch size
    Count,
    /// Batch interval elapsed since the last flush
    Deadline,
}

/// Tracks the next deadline and evaluates both flush triggers.
#[derive(Debug, Clone)]
pub struct FlushSchedule {
    batch_size: usize,
    batch_interval: Duration,
    next_deadline: Instant,
}

impl FlushSchedule {
    /// Creates a schedule whose first deadline is `now + batch_interval`.
    pub fn new(batch_size: usize, batch_interval: Duration, now: Instant) -> Self {
        Self {
            batch_size,
            batch_interval,
            next_deadline: now + batch_interval,
        }
    }

    /// Returns the next scheduled deadline.
    #[inline]
    pub fn deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Pushes the deadline to `now + batch_interval`.
    #[inline]
    pub fn reschedule(&mut self, now: Instant) {
        self.next_deadline = now + self.batch_interval;
    }

    /// Returns `true` once the deadline has been reached.
    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_deadline
    }

    /// Evaluates the count trigger after an append left `len` spans buffered.
    pub fn on_append(&mut self, len: usize, now: Instant) -> Option<FlushTrigger> {
        if len >= self.batch_size {
            self.reschedule(now);
            Some(FlushTrigger::Count)
        } else {
            None
        }
    }

    /// Evaluates the deadline trigger on a tick.
    pub fn on_tick(&mut self, now: Instant) -> Option<FlushTrigger> {
        if self.is_due(now) {
            self.reschedule(now);
            Some(FlushTrigger::Deadline)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(100);

    #[test]
    fn test_count_trigger_fires_at_batch_size() {
        let start = Instant::now();
        let mut schedule = FlushSchedule::new(3, INTERVAL, start);

        assert_eq!(schedule.on_append(1, start), None);
        assert_eq!(schedule.on_append(2, start), None);
        assert_eq!(schedule.on_append(3, start), Some(FlushTrigger::Count));
        // Backlog still above threshold: every append keeps firing
        assert_eq!(schedule.on_append(4, start), Some(FlushTrigger::Count));
    }

    #[test]
    fn test_deadline_trigger() {
        let start = Instant::now();
        let mut schedule = FlushSchedule::new(100, INTERVAL, start);

        assert_eq!(schedule.on_tick(start + Duration::from_millis(50)), None);
        assert_eq!(
            schedule.on_tick(start + INTERVAL),
            Some(FlushTrigger::Deadline)
        );
        assert_eq!(schedule.deadline(), start + INTERVAL * 2);
    }

    #[test]
    fn test_count_trigger_postpones_deadline() {
        let start = Instant::now();
        let mut schedule = FlushSchedule::new(2, INTERVAL, start);

        let burst = start + Duration::from_millis(90);
        assert_eq!(schedule.on_append(2, burst), Some(FlushTrigger::Count));

        // The original deadline has passed, but the burst already flushed
        assert_eq!(schedule.on_tick(start + INTERVAL), None);
        assert!(schedule.is_due(burst + INTERVAL));
    }
}

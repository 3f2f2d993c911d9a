//! Batch Buffer - bounded FIFO of spans awaiting delivery
//!
//! The buffer is the only mutable state shared between the dispatch loop
//! (which appends) and the sender (which takes and, on failure, requeues).
//! Its mutex is held for the duration of a single mutation and never across
//! the network call.
//!
//! # Backpressure policy
//!
//! Producers are never blocked or told about drops. When an append pushes the
//! length past `max_backlog`, the oldest spans are evicted from the head so
//! the buffer keeps only the most recent `max_backlog` spans. Survivors keep
//! their relative order.
//!
//! # Taking a batch
//!
//! [`take`](BatchBuffer::take) swaps the whole backing storage out under the
//! lock, so a flush owns exactly the spans it sends and nothing has to be
//! removed afterwards. A failed flush hands its spans back with
//! [`requeue`](BatchBuffer::requeue), which puts them ahead of anything that
//! arrived in the meantime.

#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_evicted_overflow, debug_assert_within_backlog};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of a single append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    /// Buffer length after the append (and any eviction)
    pub len: usize,
    /// Spans evicted from the head to respect the backlog
    pub evicted: usize,
}

/// Ordered, capacity-bounded sequence of pending spans.
#[derive(Debug)]
pub struct BatchBuffer<S> {
    spans: Mutex<VecDeque<S>>,
    max_backlog: usize,
}

impl<S> BatchBuffer<S> {
    /// Creates an empty buffer holding at most `max_backlog` spans.
    pub fn new(max_backlog: usize) -> Self {
        Self {
            spans: Mutex::new(VecDeque::new()),
            max_backlog,
        }
    }

    /// Returns the backlog capacity.
    #[inline]
    pub fn max_backlog(&self) -> usize {
        self.max_backlog
    }

    // A panic while holding the lock cannot leave the deque half-mutated,
    // so the poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<S>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a span at the tail, evicting from the head if over capacity.
    pub fn append(&self, span: S) -> Appended {
        let mut spans = self.lock();
        spans.push_back(span);
        let evicted = evict_overflow(&mut spans, self.max_backlog);

        Appended {
            len: spans.len(),
            evicted,
        }
    }

    /// Returns the current number of buffered spans.
    pub fn snapshot_len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Takes every buffered span, leaving the buffer empty.
    pub fn take(&self) -> Vec<S> {
        let taken = std::mem::take(&mut *self.lock());
        Vec::from(taken)
    }

    /// Puts undelivered spans back at the head, ahead of newer arrivals.
    ///
    /// Returns how many of the oldest spans had to be evicted to stay within
    /// the backlog.
    pub fn requeue(&self, undelivered: Vec<S>) -> usize {
        if undelivered.is_empty() {
            return 0;
        }

        let mut spans = self.lock();
        let newer = std::mem::take(&mut *spans);
        let mut merged = VecDeque::from(undelivered);
        merged.extend(newer);
        *spans = merged;

        evict_overflow(&mut spans, self.max_backlog)
    }
}

fn evict_overflow<S>(spans: &mut VecDeque<S>, max_backlog: usize) -> usize {
    let before = spans.len();
    let evicted = before.saturating_sub(max_backlog);
    if evicted > 0 {
        spans.drain(..evicted);
    }

    #[cfg(debug_assertions)]
    {
        debug_assert_evicted_overflow!(before, evicted, max_backlog);
        debug_assert_within_backlog!(spans.len(), max_backlog);
    }

    evicted
}

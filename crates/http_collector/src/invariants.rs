//! Debug assertion macros for buffer and sender invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so release
//! builds pay nothing for them.

// =============================================================================
// Bounded backlog
// =============================================================================

/// Assert that the buffer never holds more than its backlog after a mutation.
///
/// **Invariant**: `len(buffer) <= max_backlog`
///
/// Used in: `BatchBuffer::append()`, `BatchBuffer::requeue()`
macro_rules! debug_assert_within_backlog {
    ($len:expr, $max_backlog:expr) => {
        debug_assert!(
            $len <= $max_backlog,
            "backlog bound violated: buffer holds {} spans, capacity is {}",
            $len,
            $max_backlog
        )
    };
}

// =============================================================================
// Eviction accounting
// =============================================================================

/// Assert that eviction removed exactly the overflow.
///
/// **Invariant**: `before - evicted == min(before, max_backlog)`
///
/// Used in: `BatchBuffer::append()`, `BatchBuffer::requeue()`
macro_rules! debug_assert_evicted_overflow {
    ($before:expr, $evicted:expr, $max_backlog:expr) => {
        debug_assert!(
            $before - $evicted == ::std::cmp::min($before, $max_backlog),
            "eviction accounting violated: {} spans before, {} evicted, capacity {}",
            $before,
            $evicted,
            $max_backlog
        )
    };
}

// =============================================================================
// Single in-flight delivery
// =============================================================================

/// Assert that no other delivery is in flight when one starts.
///
/// **Invariant**: `send_lock held → in_flight == 0 before this send`
///
/// Used in: `BatchSender::flush()`
macro_rules! debug_assert_single_send {
    ($previous_in_flight:expr) => {
        debug_assert!(
            $previous_in_flight == 0,
            "send serialization violated: {} deliveries already in flight",
            $previous_in_flight
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_evicted_overflow;
pub(crate) use debug_assert_single_send;
pub(crate) use debug_assert_within_backlog;

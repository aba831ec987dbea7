//! Round-robin selection over a shared cursor

use std::sync::atomic::{AtomicUsize, Ordering};

/// Consume one position of the cursor and map it onto `[0, len)`.
///
/// `fetch_add` wraps at `usize::MAX`, and the reduction is a true modulo, so
/// every reachable cursor value yields an in-range index. `len` must be non-zero.
pub fn next_index(cursor: &AtomicUsize, len: usize) -> usize {
    cursor.fetch_add(1, Ordering::Relaxed) % len
}

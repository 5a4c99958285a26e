//! SATB buffer counters.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time view of a buffer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SatbMetrics {
    /// Arena pages obtained from the page pool.
    pub pages_allocated: usize,
    /// Arena pages handed back to the page pool.
    pub pages_returned: usize,
    /// Nodes constructed inside arena pages.
    pub nodes_carved: usize,
    /// Nodes moved to the retired list.
    pub nodes_retired: usize,
    /// Object references delivered to collector mark stacks.
    pub objects_drained: usize,
    /// Number of `get_retired_objects` / `clear_buffer` calls.
    pub drains: usize,
}

impl SatbMetrics {
    /// Pages currently held by the arena.
    #[must_use]
    pub const fn pages_outstanding(&self) -> usize {
        self.pages_allocated - self.pages_returned
    }
}

/// Live counters, updated with relaxed atomics off the push fast path.
#[derive(Debug, Default)]
pub(crate) struct SatbStats {
    pages_allocated: AtomicUsize,
    pages_returned: AtomicUsize,
    nodes_carved: AtomicUsize,
    nodes_retired: AtomicUsize,
    objects_drained: AtomicUsize,
    drains: AtomicUsize,
}

impl SatbStats {
    pub(crate) const fn new() -> Self {
        Self {
            pages_allocated: AtomicUsize::new(0),
            pages_returned: AtomicUsize::new(0),
            nodes_carved: AtomicUsize::new(0),
            nodes_retired: AtomicUsize::new(0),
            objects_drained: AtomicUsize::new(0),
            drains: AtomicUsize::new(0),
        }
    }

    pub(crate) fn record_page(&self, nodes: usize) {
        self.pages_allocated.fetch_add(1, Ordering::Relaxed);
        self.nodes_carved.fetch_add(nodes, Ordering::Relaxed);
    }

    pub(crate) fn record_pages_returned(&self, pages: usize) {
        self.pages_returned.fetch_add(pages, Ordering::Relaxed);
    }

    pub(crate) fn record_retire(&self) {
        self.nodes_retired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drain(&self, objects: usize) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.objects_drained.fetch_add(objects, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SatbMetrics {
        SatbMetrics {
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_returned: self.pages_returned.load(Ordering::Relaxed),
            nodes_carved: self.nodes_carved.load(Ordering::Relaxed),
            nodes_retired: self.nodes_retired.load(Ordering::Relaxed),
            objects_drained: self.objects_drained.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
        }
    }
}

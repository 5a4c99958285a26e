//! Logging helpers.
//!
//! With the `tracing` feature enabled these emit structured events; without
//! it they compile to nothing. Nothing on the barrier fast path logs.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::io;
    use tracing::Span;

    /// Create a span around a collector drain of the retired list.
    pub fn span_drain(kind: &'static str) -> Span {
        tracing::debug_span!("satb_drain", kind = kind)
    }

    /// Log a new arena page carved into nodes.
    pub fn log_page_allocated(bytes: usize, nodes: usize) {
        tracing::debug!(bytes, nodes, "satb_page_allocated");
    }

    /// Log the end of a drain.
    pub fn log_drain(nodes: usize, objects: usize) {
        tracing::debug!(nodes, objects, "satb_drain_done");
    }

    /// Log leftover retired nodes recycled by `init`.
    pub fn log_init_recycled(nodes: usize) {
        tracing::debug!(nodes, "satb_init_recycled");
    }

    /// Log pages handed back to the pool by full reclamation.
    pub fn log_pages_reclaimed(pages: usize, bytes: usize) {
        tracing::debug!(pages, bytes, "satb_pages_reclaimed");
    }

    /// Log a successful heap bitmap reservation.
    pub fn log_heap_bitmap_mapped(start: usize, bytes: usize, max_heap: usize) {
        tracing::info!(start, bytes, max_heap, "heap_bitmap_mapped");
    }

    /// Log an optional OS hint (huge page advice, VMA name) that was refused.
    pub fn log_os_hint_refused(hint: &'static str, err: &io::Error) {
        tracing::debug!(hint, error = %err, "os_hint_refused");
    }

    /// Log a failed unmap during teardown.
    pub fn log_unmap_failure(start: usize, bytes: usize, err: &io::Error) {
        tracing::error!(start, bytes, error = %err, "heap_bitmap_unmap_failed");
    }

    /// Log the heap bitmap being released.
    pub fn log_heap_bitmap_destroyed(bytes: usize) {
        tracing::info!(bytes, "heap_bitmap_destroyed");
    }
}

#[cfg(not(feature = "tracing"))]
#[allow(clippy::missing_const_for_fn)]
pub mod internal {
    use std::io;

    /// Stub span guard when tracing is disabled.
    pub struct Span;

    impl Span {
        pub fn entered(self) -> Self {
            self
        }
    }

    pub fn span_drain(_kind: &'static str) -> Span {
        Span
    }

    pub fn log_page_allocated(_bytes: usize, _nodes: usize) {}

    pub fn log_drain(_nodes: usize, _objects: usize) {}

    pub fn log_init_recycled(_nodes: usize) {}

    pub fn log_pages_reclaimed(_pages: usize, _bytes: usize) {}

    pub fn log_heap_bitmap_mapped(_start: usize, _bytes: usize, _max_heap: usize) {}

    pub fn log_os_hint_refused(_hint: &'static str, _err: &io::Error) {}

    pub fn log_unmap_failure(_start: usize, _bytes: usize, _err: &io::Error) {}

    pub fn log_heap_bitmap_destroyed(_bytes: usize) {}
}

pub use internal::*;

//! Per-mutator write barrier state.

use super::buffer::{NodeRef, SatbBuffer};
use crate::object::ObjectRef;
use crate::space::GcHeap;

/// The node a mutator thread is currently filling.
///
/// Created once per mutator. Dropping it retires the current node so that
/// whatever was recorded reaches the collector.
///
/// # Examples
///
/// ```ignore
/// let mut barrier = MutatorBuffer::new(SatbBuffer::instance());
/// // In the pre-write barrier, before `field = new_value`:
/// barrier.remember(&heap, old_value);
/// ```
#[derive(Debug)]
pub struct MutatorBuffer<'a> {
    buffer: &'a SatbBuffer,
    node: Option<NodeRef<'a>>,
}

impl<'a> MutatorBuffer<'a> {
    /// Create a mutator with no node yet; the first record fetches one.
    #[must_use]
    pub const fn new(buffer: &'a SatbBuffer) -> Self {
        Self { buffer, node: None }
    }

    /// The shared buffer this mutator feeds.
    #[must_use]
    pub const fn buffer(&self) -> &'a SatbBuffer {
        self.buffer
    }

    /// Pre-write barrier: record the overwritten reference `old` if the
    /// collector still needs it. Returns `true` if it was recorded.
    pub fn remember<H: GcHeap + ?Sized>(&mut self, heap: &H, old: Option<ObjectRef>) -> bool {
        match old {
            Some(obj) if self.buffer.should_enqueue(heap, old) => {
                self.push(obj);
                true
            }
            _ => false,
        }
    }

    /// Record `obj` unconditionally.
    #[inline]
    pub fn push(&mut self, obj: ObjectRef) {
        self.buffer.ensure_good_node(&mut self.node).push(obj);
    }

    /// Objects in the current, not yet retired node.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.node.as_ref().map_or(0, |node| node.len())
    }

    /// Retire the current node, if any, so a drain will see its contents.
    pub fn flush(&mut self) {
        if let Some(node) = self.node.take() {
            self.buffer.retire_node(node);
        }
    }
}

impl Drop for MutatorBuffer<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

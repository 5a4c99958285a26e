//! Fixed-capacity buffer node, the unit of SATB recording.

use std::mem::size_of;
use std::sync::atomic::AtomicPtr;

use parking_lot::Mutex;

use super::list::Linked;
use crate::object::ObjectRef;

/// Alignment of buffer nodes and of the arena page header.
pub const CACHE_LINE_SIZE: usize = 64;

/// Whole cache lines occupied by one node.
const NODE_CACHE_LINES: usize = 9;

/// Total size of a node in bytes.
pub const NODE_SIZE: usize = NODE_CACHE_LINES * CACHE_LINE_SIZE;

/// Pointer-sized words taken by the node header: link, lock, cursor.
const HEADER_WORDS: usize = 3;

/// Object slots per node: whatever is left of the node after its header.
///
/// 69 on 64-bit targets.
pub const CAPACITY: usize = NODE_SIZE / size_of::<usize>() - HEADER_WORDS;

struct Slots {
    top: usize,
    container: [Option<ObjectRef>; CAPACITY],
}

impl Slots {
    /// Zero the written span only; the tail past `top` is already clear.
    fn clear(&mut self) {
        self.container[..self.top].fill(None);
        self.top = 0;
    }
}

/// A cache-line aligned array of recorded object references.
///
/// A node is written by one mutator at a time. The per-node lock protects
/// the content against a concurrent drain during retirement hand-off.
#[repr(C, align(64))]
pub struct TreapNode {
    next: AtomicPtr<Self>,
    slots: Mutex<Slots>,
}

const _: () = assert!(size_of::<TreapNode>() == NODE_SIZE);
const _: () = assert!(NODE_SIZE % size_of::<usize>() == 0);

impl TreapNode {
    /// Create an empty, unlinked node.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicPtr::new(std::ptr::null_mut()),
            slots: Mutex::new(Slots {
                top: 0,
                container: [None; CAPACITY],
            }),
        }
    }

    /// Returns `true` if nothing has been pushed since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().top == 0
    }

    /// Returns `true` once `CAPACITY` objects have been pushed.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.lock().top == CAPACITY
    }

    /// Number of recorded objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().top
    }

    /// Record `obj`.
    ///
    /// # Panics
    ///
    /// Panics if the node is full. Callers keep nodes non-full through
    /// [`SatbBuffer::ensure_good_node`](crate::SatbBuffer::ensure_good_node).
    pub fn push(&self, obj: ObjectRef) {
        let mut slots = self.slots.lock();
        let top = slots.top;
        assert!(top < CAPACITY, "push into a full SATB node");
        slots.container[top] = Some(obj);
        slots.top = top + 1;
    }

    /// Forget every recorded object.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Move every recorded object into `stack`, oldest first, and clear
    /// the node. Returns the number of objects moved.
    pub fn get_objects<E: Extend<ObjectRef>>(&self, stack: &mut E) -> usize {
        let mut slots = self.slots.lock();
        let top = slots.top;
        stack.extend(slots.container[..top].iter().flatten().copied());
        slots.clear();
        top
    }
}

impl Default for TreapNode {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: `next` is used exclusively for list membership.
unsafe impl Linked for TreapNode {
    fn link(&self) -> &AtomicPtr<Self> {
        &self.next
    }
}

#[cfg(test)]
mod tests {
    use super::{TreapNode, CACHE_LINE_SIZE, CAPACITY, NODE_SIZE};
    use crate::object::ObjectRef;

    fn obj(i: usize) -> ObjectRef {
        ObjectRef::from_addr((i + 1) * 16).unwrap()
    }

    #[test]
    fn test_node_layout() {
        assert_eq!(std::mem::align_of::<TreapNode>(), CACHE_LINE_SIZE);
        assert_eq!(NODE_SIZE % CACHE_LINE_SIZE, 0);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(CAPACITY, 69);
    }

    #[test]
    fn test_fill_to_capacity() {
        let node = TreapNode::new();
        assert!(node.is_empty());
        for i in 0..CAPACITY {
            assert!(!node.is_full());
            node.push(obj(i));
        }
        assert!(node.is_full());
        assert_eq!(node.len(), CAPACITY);

        node.clear();
        assert!(node.is_empty());
        assert!(!node.is_full());
    }

    #[test]
    #[should_panic(expected = "push into a full SATB node")]
    fn test_push_into_full_node_panics() {
        let node = TreapNode::new();
        for i in 0..=CAPACITY {
            node.push(obj(i));
        }
    }

    #[test]
    fn test_get_objects_is_fifo_and_destructive() {
        let node = TreapNode::new();
        for i in 0..10 {
            node.push(obj(i));
        }

        let mut stack = Vec::new();
        assert_eq!(node.get_objects(&mut stack), 10);
        assert_eq!(stack, (0..10).map(obj).collect::<Vec<_>>());
        assert!(node.is_empty());

        assert_eq!(node.get_objects(&mut stack), 0);
        assert_eq!(stack.len(), 10);
    }

    #[test]
    fn test_reuse_after_clear_does_not_leak_old_entries() {
        let node = TreapNode::new();
        for i in 0..CAPACITY {
            node.push(obj(i));
        }
        node.clear();
        node.push(obj(1000));

        let mut stack = Vec::new();
        node.get_objects(&mut stack);
        assert_eq!(stack, vec![obj(1000)]);
    }
}

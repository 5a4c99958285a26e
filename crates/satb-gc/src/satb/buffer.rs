//! The process-wide SATB buffer.

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock};

use super::arena::Page;
use super::list::{Chain, LockFreeList, LockedList, NodeList};
use super::node::TreapNode;
use crate::config::SatbConfig;
use crate::logging;
use crate::metrics::{SatbMetrics, SatbStats};
use crate::object::ObjectRef;
use crate::page_pool::{MmapPagePool, PagePool};
use crate::space::GcHeap;

/// Lifecycle of a [`SatbBuffer`].
///
/// ```text
/// Uninitialized ──init──► Initialized ──fini──► Finalized ──init──► Initialized
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferState {
    /// `init` has never run.
    Uninitialized = 0,
    /// Nodes are available to mutators.
    Initialized = 1,
    /// All pages were returned by `fini`.
    Finalized = 2,
}

impl BufferState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Initialized,
            2 => Self::Finalized,
            _ => Self::Uninitialized,
        }
    }
}

/// Exclusive handle to a buffer node held by one mutator.
///
/// A node is reachable from exactly one place at a time: a `NodeRef`, the
/// free list, or the retired list. Handing a `NodeRef` back to the buffer
/// (retire) consumes it.
///
/// Every handle must end up in [`SatbBuffer::retire_node`], directly or
/// through [`MutatorBuffer`](crate::MutatorBuffer). A handle that is simply
/// dropped takes its node out of circulation until `fini`; debug builds
/// assert on that.
#[must_use = "a node handle must be retired, dropping it loses the node until `fini`"]
pub struct NodeRef<'a> {
    node: NonNull<TreapNode>,
    _buffer: PhantomData<&'a SatbBuffer>,
}

impl NodeRef<'_> {
    const fn new(node: NonNull<TreapNode>) -> Self {
        Self {
            node,
            _buffer: PhantomData,
        }
    }

    /// Give up the handle without tripping the drop check.
    fn into_raw(self) -> NonNull<TreapNode> {
        ManuallyDrop::new(self).node
    }
}

impl Drop for NodeRef<'_> {
    fn drop(&mut self) {
        debug_assert!(
            std::thread::panicking(),
            "NodeRef dropped without being retired"
        );
    }
}

impl Deref for NodeRef<'_> {
    type Target = TreapNode;

    fn deref(&self) -> &TreapNode {
        // SAFETY: arena memory outlives every handle; `fini` requires that
        // no handle is alive.
        unsafe { self.node.as_ref() }
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("node", &self.node)
            .field("len", &self.len())
            .finish()
    }
}

// SAFETY: TreapNode is Sync and the handle is unique.
unsafe impl Send for NodeRef<'_> {}

/// Snapshot-at-the-beginning buffer shared by all mutators.
///
/// # Architecture
///
/// ```text
///   mutator A          mutator B               collector
///   ┌────────┐         ┌────────┐
///   │NodeRef │         │NodeRef │
///   └───┬────┘         └───┬────┘
///       │ full: retire     │
///       ▼                  ▼
///   ┌──────────────────────────────┐  pop_all  ┌───────────────┐
///   │ retired_nodes (lock-free)    ├──────────►│ drain to stack│
///   └──────────────────────────────┘           └──────┬────────┘
///   ┌──────────────────────────────┐   recycle        │
///   │ free_nodes (lock-free)       │◄─────────────────┘
///   └──────────────┬───────────────┘
///                  │ empty: carve a new page
///   ┌──────────────┴───────────────┐
///   │ arena (locked list of pages) │◄── PagePool
///   └──────────────────────────────┘
/// ```
pub struct SatbBuffer {
    config: SatbConfig,
    page_pool: Arc<dyn PagePool>,
    arena: LockedList<Page>,
    free_nodes: LockFreeList<TreapNode>,
    retired_nodes: LockFreeList<TreapNode>,
    state: AtomicU8,
    stats: SatbStats,
}

impl SatbBuffer {
    /// The process-wide buffer.
    ///
    /// Built on first access with [`SatbConfig::default`] over an
    /// [`MmapPagePool`], and never destroyed.
    #[must_use]
    pub fn instance() -> &'static Self {
        static INSTANCE: LazyLock<SatbBuffer> =
            LazyLock::new(|| SatbBuffer::new(SatbConfig::default()));
        &INSTANCE
    }

    /// Create a buffer whose pages come straight from the OS.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    pub fn new(config: SatbConfig) -> Self {
        Self::with_page_pool(config, Arc::new(MmapPagePool))
    }

    /// Create a buffer drawing pages from `page_pool`.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    pub fn with_page_pool(config: SatbConfig, page_pool: Arc<dyn PagePool>) -> Self {
        config.validate();
        Self {
            config,
            page_pool,
            arena: LockedList::new(),
            free_nodes: LockFreeList::new(),
            retired_nodes: LockFreeList::new(),
            state: AtomicU8::new(BufferState::Uninitialized as u8),
            stats: SatbStats::new(),
        }
    }

    /// The configuration this buffer was built with.
    #[must_use]
    pub const fn config(&self) -> &SatbConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BufferState {
        BufferState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Counter snapshot.
    #[must_use]
    pub fn metrics(&self) -> SatbMetrics {
        self.stats.snapshot()
    }

    /// Decide whether the write barrier must record `obj`.
    ///
    /// Returns `false` for null, for objects outside the young space during
    /// a young collection (generational builds), for objects allocated since
    /// the trace began, and for objects already marked. Otherwise claims the
    /// object's enqueue bit and returns `true` only if this caller won the
    /// claim. The buffer itself is not touched.
    #[inline]
    pub fn should_enqueue<H: GcHeap + ?Sized>(&self, heap: &H, obj: Option<ObjectRef>) -> bool {
        let Some(obj) = obj else {
            return false;
        };
        let space = heap.region_space();
        if self.config.generational
            && heap.gc_reason().is_young()
            && !space.is_young_space_object(obj)
        {
            return false;
        }
        if space.is_new_object_since_trace(obj) {
            return false;
        }
        if space.is_marked_object(obj) {
            return false;
        }
        !space.enqueue_object(obj)
    }

    /// Make `slot` hold a node with room for at least one more object.
    ///
    /// An empty slot gets a free node; a full node is retired and replaced;
    /// a node with room is kept. When the free list is exhausted a new page
    /// of `config.page_size` bytes is carved.
    ///
    /// # Panics
    ///
    /// Panics if a node taken from the free list is not empty, or if the
    /// page pool cannot supply a page.
    pub fn ensure_good_node<'a, 'n>(&'a self, slot: &'n mut Option<NodeRef<'a>>) -> &'n TreapNode {
        if let Some(current) = slot.take() {
            if !current.is_full() {
                return slot.insert(current);
            }
            self.retire_node(current);
        }
        let fresh = match self.pop_free_node() {
            Some(node) => node,
            None => self.grow(self.config.page_size),
        };
        slot.insert(fresh)
    }

    /// Prepare the buffer for a marking cycle.
    ///
    /// Leftover retired nodes from an earlier cycle are cleared and moved to
    /// the free list. If no free node exists afterwards, a first page of
    /// `initial_pages * page_size` bytes is carved.
    ///
    /// Must run with no concurrent access to the buffer. Calling it twice
    /// without `fini` is harmless but wasteful.
    pub fn init(&self) {
        let mut recycled = 0;
        // SAFETY: pop_all hands us the retired chain exclusively.
        for node in unsafe { Chain::new(self.retired_nodes.pop_all()) } {
            // SAFETY: nodes live in arena pages that are still owned.
            unsafe { node.as_ref() }.clear();
            unsafe { self.free_nodes.push(node) };
            recycled += 1;
        }
        if recycled > 0 {
            logging::log_init_recycled(recycled);
        }

        if self.free_nodes.is_empty() {
            let length = self.config.initial_pages * self.config.page_size;
            let first = self.grow(length);
            // SAFETY: `first` is a fresh, unlisted node.
            unsafe { self.free_nodes.push(first.into_raw()) };
        }
        self.state
            .store(BufferState::Initialized as u8, Ordering::Release);
    }

    /// Hand `node` to the collector.
    ///
    /// Used when a node fills up and when a mutator is torn down with a
    /// partially filled node.
    pub fn retire_node(&self, node: NodeRef<'_>) {
        // SAFETY: NodeRef is the unique owner of an unlisted node.
        unsafe { self.retired_nodes.push(node.into_raw()) };
        self.stats.record_retire();
    }

    /// Drain every retired node into `stack` and recycle the nodes.
    ///
    /// Nodes retired while the drain runs stay for the next drain. Returns
    /// the number of objects appended.
    pub fn get_retired_objects<E: Extend<ObjectRef>>(&self, stack: &mut E) -> usize {
        let _span = logging::span_drain("collect").entered();
        let (nodes, objects) = self.drain_retired(|node| node.get_objects(stack));
        self.stats.record_drain(objects);
        logging::log_drain(nodes, objects);
        objects
    }

    /// Drain every retired node, discarding its contents.
    ///
    /// Used when a marking cycle is abandoned.
    pub fn clear_buffer(&self) {
        let _span = logging::span_drain("discard").entered();
        let (nodes, _) = self.drain_retired(|node| {
            node.clear();
            0
        });
        self.stats.record_drain(0);
        logging::log_drain(nodes, 0);
    }

    /// Return every page to the page pool and mark the buffer finalized.
    ///
    /// # Safety
    ///
    /// No mutator may be using the buffer and no [`NodeRef`] may be alive,
    /// anywhere in the process.
    pub unsafe fn fini(&self) {
        // SAFETY: forwarded caller contract.
        unsafe { self.reclaim_all_pages() };
        self.state
            .store(BufferState::Finalized as u8, Ordering::Release);
    }

    /// Forget both node lists without clearing them and return every arena
    /// page to the pool. Calling it on an empty buffer does nothing.
    ///
    /// # Safety
    ///
    /// Same contract as [`SatbBuffer::fini`].
    pub unsafe fn reclaim_all_pages(&self) {
        self.free_nodes.reset();
        self.retired_nodes.reset();

        let mut pages = 0;
        let mut bytes = 0;
        // SAFETY: pop_all detaches the arena; the caller guarantees nothing
        // references any node carved from these pages.
        for page in unsafe { Chain::new(self.arena.pop_all()) } {
            bytes += unsafe { Page::release(page, self.page_pool.as_ref()) };
            pages += 1;
        }
        if pages > 0 {
            self.stats.record_pages_returned(pages);
            logging::log_pages_reclaimed(pages, bytes);
        }
    }

    fn drain_retired(&self, mut f: impl FnMut(&TreapNode) -> usize) -> (usize, usize) {
        let mut nodes = 0;
        let mut objects = 0;
        // SAFETY: pop_all hands us the retired chain exclusively.
        for node in unsafe { Chain::new(self.retired_nodes.pop_all()) } {
            // SAFETY: nodes live in arena pages that are still owned.
            objects += f(unsafe { node.as_ref() });
            unsafe { self.free_nodes.push(node) };
            nodes += 1;
        }
        (nodes, objects)
    }

    fn pop_free_node(&self) -> Option<NodeRef<'_>> {
        let node = self.free_nodes.pop()?;
        // SAFETY: listed nodes live in owned arena pages.
        assert!(
            unsafe { node.as_ref() }.is_empty(),
            "get an unempty node from free nodes"
        );
        Some(NodeRef::new(node))
    }

    /// Carve a new page of `length` bytes, keep its first node and put the
    /// rest on the free list.
    fn grow(&self, length: usize) -> NodeRef<'_> {
        let page = Page::allocate(self.page_pool.as_ref(), length);
        // SAFETY: the page is fresh and unlisted.
        unsafe { self.arena.push(page) };
        // SAFETY: fresh page, carved exactly once.
        let chain = unsafe { Page::construct_free_node_list(page) };
        self.stats.record_page(chain.count);
        logging::log_page_allocated(length, chain.count);

        // SAFETY: the chain is private until its nodes are pushed.
        let mut nodes = unsafe { Chain::new(chain.head) };
        let Some(first) = nodes.next() else {
            panic!("arena page of {length} bytes produced no nodes");
        };
        for node in nodes {
            // SAFETY: freshly constructed, unlisted node.
            unsafe { self.free_nodes.push(node) };
        }
        NodeRef::new(first)
    }
}

impl Drop for SatbBuffer {
    fn drop(&mut self) {
        // SAFETY: `&mut self` proves no NodeRef borrowed from us is alive.
        unsafe { self.reclaim_all_pages() };
    }
}

impl fmt::Debug for SatbBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SatbBuffer")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

//! Arena pages that back buffer nodes.
//!
//! # Page Layout
//!
//! ```text
//! +-------------+--------+--------+-----+--------+---------+
//! | Page header | node 0 | node 1 | ... | node n | unused  |
//! +-------------+--------+--------+-----+--------+---------+
//! ^ page start  ^ start + header size rounded up to CACHE_LINE_SIZE
//! ```
//!
//! A page is obtained from a [`PagePool`], gets a [`Page`] header written in
//! place at its start, and the rest is sliced into consecutive
//! [`TreapNode`]s. Nodes are never freed on their own; the whole page goes
//! back to the pool during full reclamation.

use std::mem::{align_of, needs_drop, size_of};
use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicPtr;

use sys_alloc::align_up;

use super::list::Linked;
use super::node::{TreapNode, CACHE_LINE_SIZE, NODE_SIZE};
use crate::page_pool::PagePool;

/// Header written at the start of every arena page.
#[repr(C)]
pub struct Page {
    next: AtomicPtr<Self>,
    length: usize,
}

/// Bytes reserved at the start of a page for its header.
pub const PAGE_HEADER_SIZE: usize = align_up(size_of::<Page>(), CACHE_LINE_SIZE);

// Pages are returned to the pool without running destructors.
const _: () = assert!(!needs_drop::<TreapNode>());
const _: () = assert!(!needs_drop::<Page>());

/// Smallest page that can hold its header and one node.
#[must_use]
pub const fn min_page_size() -> usize {
    PAGE_HEADER_SIZE + NODE_SIZE
}

/// Number of nodes a page of `length` bytes is carved into.
#[must_use]
pub const fn nodes_per_page(length: usize) -> usize {
    if length < PAGE_HEADER_SIZE {
        return 0;
    }
    (length - PAGE_HEADER_SIZE) / NODE_SIZE
}

/// Nodes freshly carved from one page, linked in address order.
pub struct NodeChain {
    pub(crate) head: Option<NonNull<TreapNode>>,
    pub(crate) count: usize,
}

impl Page {
    /// Obtain `length` bytes from `pool` and write a page header there.
    ///
    /// # Panics
    ///
    /// Panics if the pool returns memory that is not cache-line aligned or
    /// `length` cannot fit a single node.
    pub(crate) fn allocate(pool: &dyn PagePool, length: usize) -> NonNull<Self> {
        assert!(
            length >= min_page_size(),
            "arena page of {length} bytes cannot hold a node"
        );
        let memory = pool.get_page(length);
        assert!(
            memory.as_ptr() as usize % CACHE_LINE_SIZE == 0,
            "page pool returned memory at {:p} that is not cache-line aligned",
            memory.as_ptr()
        );

        let page = memory.cast::<Self>();
        // SAFETY: fresh, exclusively owned, suitably aligned memory.
        unsafe {
            page.as_ptr().write(Self {
                next: AtomicPtr::new(ptr::null_mut()),
                length,
            });
        }
        page
    }

    /// Byte size of this page's allocation.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Slice the space after the header into nodes and chain them.
    ///
    /// # Safety
    ///
    /// `page` must come from [`Page::allocate`] and must not have been
    /// carved before.
    pub(crate) unsafe fn construct_free_node_list(page: NonNull<Self>) -> NodeChain {
        let base = page.as_ptr().cast::<u8>() as usize;
        // SAFETY: the header was written by `allocate`.
        let end = base + unsafe { page.as_ref() }.length;

        let mut head: Option<NonNull<TreapNode>> = None;
        let mut prev: Option<NonNull<TreapNode>> = None;
        let mut count = 0;
        let mut cursor = align_up(base + PAGE_HEADER_SIZE, align_of::<TreapNode>());

        while cursor + NODE_SIZE <= end {
            debug_assert_eq!(cursor % align_of::<TreapNode>(), 0);
            // SAFETY: `cursor..cursor + NODE_SIZE` lies inside the page,
            // is aligned and does not overlap any other node.
            let node = unsafe {
                let slot = cursor as *mut TreapNode;
                slot.write(TreapNode::new());
                NonNull::new_unchecked(slot)
            };

            match prev {
                // SAFETY: `prev` was constructed in an earlier iteration.
                Some(p) => unsafe { p.as_ref() }
                    .link()
                    .store(node.as_ptr(), std::sync::atomic::Ordering::Relaxed),
                None => head = Some(node),
            }
            prev = Some(node);
            count += 1;
            cursor += NODE_SIZE;
        }

        NodeChain { head, count }
    }

    /// Return the page's memory to `pool`.
    ///
    /// # Safety
    ///
    /// `page` must come from [`Page::allocate`] on the same pool and no node
    /// carved from it may still be referenced anywhere.
    pub(crate) unsafe fn release(page: NonNull<Self>, pool: &dyn PagePool) -> usize {
        // SAFETY: header is live until the memory goes back.
        let length = unsafe { page.as_ref() }.length;
        unsafe { pool.return_page(page.cast::<u8>(), length) };
        length
    }
}

// SAFETY: `next` is used exclusively for arena membership.
unsafe impl Linked for Page {
    fn link(&self) -> &AtomicPtr<Self> {
        &self.next
    }
}

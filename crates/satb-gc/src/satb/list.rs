//! Intrusive singly linked stacks used to move nodes and pages around.
//!
//! Two strategies share the [`NodeList`] interface:
//!
//! - [`LockFreeList`]: a CAS-based stack. Mutators retire full nodes through
//!   it without ever blocking; popping a free node takes a short lock.
//! - [`LockedList`]: the same stack behind a mutex, used where contention is
//!   rare (the page arena).
//!
//! Both store the link inside the element (see [`Linked`]), so an element
//! can sit in at most one list at a time.
//!
//! Free nodes leave the free list and come back to it, so a bare CAS pop
//! would be open to ABA: a popper holding a stale `next` could install a
//! node another thread already owns. [`LockFreeList`] therefore serializes
//! the removing side (`pop` and `pop_all`) on a small lock while `push`
//! stays a plain CAS loop. While the pop lock is held nothing can leave the
//! list, so the head observed by a popper cannot be recycled under it.

use std::iter::FusedIterator;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam::utils::Backoff;
use parking_lot::Mutex;

/// An element carrying its own intrusive `next` link.
///
/// # Safety
///
/// `link` must always return the same field, and that field must not be
/// used for anything but list membership.
pub unsafe trait Linked: Sized {
    /// The element's `next` pointer.
    fn link(&self) -> &AtomicPtr<Self>;
}

/// Common interface of the intrusive stacks.
pub trait NodeList<T: Linked> {
    /// Prepends `node`.
    ///
    /// # Safety
    ///
    /// `node` must point to a live element that is not a member of any list
    /// and stays alive for as long as it is reachable from one.
    unsafe fn push(&self, node: NonNull<T>);

    /// Removes and returns the head, or `None` if the list is empty.
    fn pop(&self) -> Option<NonNull<T>>;

    /// Detaches the whole chain and returns its head.
    ///
    /// The caller owns the returned chain exclusively; walk it with
    /// [`Chain`].
    fn pop_all(&self) -> Option<NonNull<T>>;

    /// Forgets every element without touching them.
    fn reset(&self);

    /// Returns `true` if the list has no elements.
    fn is_empty(&self) -> bool;
}

/// Intrusive stack with lock-free pushes.
///
/// Removal goes through `pop_lock`; pushes never take it.
pub struct LockFreeList<T> {
    head: AtomicPtr<T>,
    pop_lock: Mutex<()>,
}

impl<T> LockFreeList<T> {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            pop_lock: Mutex::new(()),
        }
    }
}

impl<T> Default for LockFreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked> NodeList<T> for LockFreeList<T> {
    unsafe fn push(&self, node: NonNull<T>) {
        // SAFETY: caller guarantees the node is live and unlisted.
        let link = unsafe { node.as_ref() }.link();
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            link.store(head, Ordering::Relaxed);
            // Release publishes the node's contents (and link) to whoever
            // acquires it through pop/pop_all.
            match self.head.compare_exchange_weak(
                head,
                node.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    fn pop(&self) -> Option<NonNull<T>> {
        // Only pushes race with us here, and a push never changes the link
        // of a node already in the list.
        let _guard = self.pop_lock.lock();
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let node = NonNull::new(head)?;
            // SAFETY: elements stay alive while listed, and `node` cannot
            // leave the list while we hold the pop lock.
            let next = unsafe { node.as_ref() }.link().load(Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                next,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: we now own the node exclusively.
                    unsafe { node.as_ref() }
                        .link()
                        .store(ptr::null_mut(), Ordering::Relaxed);
                    return Some(node);
                }
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    fn pop_all(&self) -> Option<NonNull<T>> {
        let _guard = self.pop_lock.lock();
        NonNull::new(self.head.swap(ptr::null_mut(), Ordering::AcqRel))
    }

    fn reset(&self) {
        self.head.store(ptr::null_mut(), Ordering::Release);
    }

    fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

// SAFETY: the list only stores pointers; elements are handed between
// threads and synchronized through the head CAS.
unsafe impl<T: Send> Send for LockFreeList<T> {}
unsafe impl<T: Send> Sync for LockFreeList<T> {}

struct Head<T>(*mut T);

// SAFETY: the raw head is only touched under the list mutex.
unsafe impl<T: Send> Send for Head<T> {}

/// Mutex-protected intrusive stack.
pub struct LockedList<T> {
    head: Mutex<Head<T>>,
}

impl<T> LockedList<T> {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: Mutex::new(Head(ptr::null_mut())),
        }
    }
}

impl<T> Default for LockedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked> NodeList<T> for LockedList<T> {
    unsafe fn push(&self, node: NonNull<T>) {
        let mut head = self.head.lock();
        // SAFETY: caller guarantees the node is live and unlisted.
        unsafe { node.as_ref() }.link().store(head.0, Ordering::Relaxed);
        head.0 = node.as_ptr();
    }

    fn pop(&self) -> Option<NonNull<T>> {
        let mut head = self.head.lock();
        let node = NonNull::new(head.0)?;
        // SAFETY: listed elements are live; we hold the lock.
        let link = unsafe { node.as_ref() }.link();
        head.0 = link.load(Ordering::Relaxed);
        link.store(ptr::null_mut(), Ordering::Relaxed);
        Some(node)
    }

    fn pop_all(&self) -> Option<NonNull<T>> {
        let mut head = self.head.lock();
        NonNull::new(std::mem::replace(&mut head.0, ptr::null_mut()))
    }

    fn reset(&self) {
        self.head.lock().0 = ptr::null_mut();
    }

    fn is_empty(&self) -> bool {
        self.head.lock().0.is_null()
    }
}

/// Iterator over a chain detached with [`NodeList::pop_all`].
///
/// The successor is read before an element is yielded, so the caller may
/// push the yielded element into another list right away.
pub struct Chain<T> {
    cur: *mut T,
}

impl<T> Chain<T> {
    /// Walk the chain starting at `head`.
    ///
    /// # Safety
    ///
    /// The chain must be exclusively owned by the caller and every element
    /// must stay alive until it has been yielded.
    pub const unsafe fn new(head: Option<NonNull<T>>) -> Self {
        Self {
            cur: match head {
                Some(node) => node.as_ptr(),
                None => ptr::null_mut(),
            },
        }
    }
}

impl<T: Linked> Iterator for Chain<T> {
    type Item = NonNull<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = NonNull::new(self.cur)?;
        // SAFETY: guaranteed live by the constructor's contract.
        let link = unsafe { node.as_ref() }.link();
        self.cur = link.load(Ordering::Acquire);
        link.store(ptr::null_mut(), Ordering::Relaxed);
        Some(node)
    }
}

impl<T: Linked> FusedIterator for Chain<T> {}

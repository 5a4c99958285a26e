//! Page pools backing the SATB arena.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use sys_alloc::{Mmap, MmapOptions};

/// Source of raw memory for arena pages.
///
/// Pages must be zero-initialized and aligned to at least
/// [`CACHE_LINE_SIZE`](crate::satb::CACHE_LINE_SIZE).
pub trait PagePool: Send + Sync {
    /// Returns `bytes` of fresh memory.
    ///
    /// Implementations treat exhaustion as fatal and panic rather than
    /// return.
    fn get_page(&self, bytes: usize) -> NonNull<u8>;

    /// Gives a page back to the pool.
    ///
    /// # Safety
    ///
    /// `ptr` and `bytes` must come from a single `get_page` call on this
    /// pool, the page must not have been returned already, and nothing may
    /// reference its memory anymore.
    unsafe fn return_page(&self, ptr: NonNull<u8>, bytes: usize);
}

/// A pool that maps every page straight from the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapPagePool;

impl PagePool for MmapPagePool {
    fn get_page(&self, bytes: usize) -> NonNull<u8> {
        match MmapOptions::new().len(bytes).map_anon() {
            Ok(mmap) => mmap.into_raw().0,
            Err(err) => panic!("page pool failed to map {bytes} bytes: {err}"),
        }
    }

    unsafe fn return_page(&self, ptr: NonNull<u8>, bytes: usize) {
        // SAFETY: the caller hands back exactly what `get_page` produced.
        drop(unsafe { Mmap::from_raw(ptr, bytes) });
    }
}

/// Wraps a pool and counts pages that have not been returned yet.
///
/// Useful for leak checks after `fini`.
#[derive(Debug, Default)]
pub struct CountingPagePool<P> {
    inner: P,
    outstanding_pages: AtomicUsize,
    outstanding_bytes: AtomicUsize,
    total_pages: AtomicUsize,
}

impl<P: PagePool> CountingPagePool<P> {
    /// Wrap `inner`.
    pub const fn new(inner: P) -> Self {
        Self {
            inner,
            outstanding_pages: AtomicUsize::new(0),
            outstanding_bytes: AtomicUsize::new(0),
            total_pages: AtomicUsize::new(0),
        }
    }

    /// Pages handed out and not yet returned.
    #[must_use]
    pub fn outstanding_pages(&self) -> usize {
        self.outstanding_pages.load(Ordering::Acquire)
    }

    /// Bytes handed out and not yet returned.
    #[must_use]
    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding_bytes.load(Ordering::Acquire)
    }

    /// Pages ever handed out.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.total_pages.load(Ordering::Acquire)
    }
}

impl<P: PagePool> PagePool for CountingPagePool<P> {
    fn get_page(&self, bytes: usize) -> NonNull<u8> {
        let page = self.inner.get_page(bytes);
        self.outstanding_pages.fetch_add(1, Ordering::AcqRel);
        self.outstanding_bytes.fetch_add(bytes, Ordering::AcqRel);
        self.total_pages.fetch_add(1, Ordering::AcqRel);
        page
    }

    unsafe fn return_page(&self, ptr: NonNull<u8>, bytes: usize) {
        let prev = self.outstanding_pages.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "page returned to a pool with no outstanding pages");
        self.outstanding_bytes.fetch_sub(bytes, Ordering::AcqRel);
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.return_page(ptr, bytes) };
    }
}

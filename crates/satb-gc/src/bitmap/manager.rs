//! Process-wide owner of the heap bitmap reservation.

use std::ffi::CStr;
use std::ptr::NonNull;

use parking_lot::RwLock;
use sys_alloc::{Mmap, MmapOptions};

use super::heap_bitmap::HeapBitmap;
use super::heap_bitmap_reservation_size;
use crate::config::HeapBitmapConfig;
use crate::logging;

/// Name given to the mapping in OS diagnostics.
const HEAP_BITMAP_VMA_NAME: &CStr = c"satb_gc_heap_bitmap";

struct Reservation {
    bitmap: HeapBitmap,
    mapping: Mmap,
}

/// Owns the single large mapping that backs the [`HeapBitmap`].
///
/// ```text
/// global() ──► HeapBitmapManager
///                 └─ RwLock<Option<Reservation>>
///                        ├─ Mmap        (round_up(bitmap_size, page))
///                        └─ HeapBitmap  (view over the Mmap)
/// ```
pub struct HeapBitmapManager {
    reservation: RwLock<Option<Reservation>>,
}

impl HeapBitmapManager {
    /// Create a manager with no reservation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reservation: RwLock::new(None),
        }
    }

    /// The process-wide manager. Never destroyed.
    #[must_use]
    pub fn global() -> &'static Self {
        static GLOBAL: HeapBitmapManager = HeapBitmapManager::new();
        &GLOBAL
    }

    /// Reserve and describe the heap bitmap for `config`.
    ///
    /// # Panics
    ///
    /// Panics if the bitmap is already initialized, if `config` is invalid,
    /// or if the OS refuses the mapping: a heap without a mark bitmap
    /// cannot run concurrent marking.
    pub fn initialize_heap_bitmap(&self, config: HeapBitmapConfig) {
        config.validate();
        let mut reservation = self.reservation.write();
        assert!(reservation.is_none(), "heap bitmap already initialized");

        let bytes = heap_bitmap_reservation_size(&config);
        let mapping = match MmapOptions::new().len(bytes).no_reserve(true).map_anon() {
            Ok(mapping) => mapping,
            Err(err) => panic!("failed to map {bytes} bytes for the heap bitmap: {err}"),
        };
        if let Err(err) = mapping.advise_no_huge_pages() {
            logging::log_os_hint_refused("no_huge_pages", &err);
        }

        let Some(base) = NonNull::new(mapping.ptr()) else {
            panic!("heap bitmap mapping returned a null address");
        };
        // SAFETY: fresh zeroed RW mapping, kept alive next to the bitmap.
        let bitmap = unsafe { HeapBitmap::from_raw(base, bytes, &config) };

        if let Err(err) = mapping.set_name(HEAP_BITMAP_VMA_NAME) {
            logging::log_os_hint_refused("vma_name", &err);
        }
        logging::log_heap_bitmap_mapped(base.as_ptr() as usize, bytes, config.max_heap_capacity);

        *reservation = Some(Reservation { bitmap, mapping });
    }

    /// Unmap the heap bitmap. Does nothing if it was never initialized.
    ///
    /// An OS failure to unmap is logged and otherwise ignored; the manager
    /// is uninitialized afterwards either way.
    pub fn destroy_heap_bitmap(&self) {
        let Some(Reservation { mapping, .. }) = self.reservation.write().take() else {
            return;
        };
        let start = mapping.ptr() as usize;
        let bytes = mapping.len();
        match mapping.unmap() {
            Ok(()) => logging::log_heap_bitmap_destroyed(bytes),
            Err(err) => logging::log_unmap_failure(start, bytes, &err),
        }
    }

    /// Returns `true` between initialize and destroy.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.reservation.read().is_some()
    }

    /// Base address of the reservation, if initialized.
    #[must_use]
    pub fn heap_bitmap_start(&self) -> Option<usize> {
        self.reservation
            .read()
            .as_ref()
            .map(|r| r.mapping.ptr() as usize)
    }

    /// Total reserved bytes, or 0 when uninitialized.
    #[must_use]
    pub fn all_heap_bitmap_size(&self) -> usize {
        self.reservation
            .read()
            .as_ref()
            .map_or(0, |r| r.mapping.len())
    }

    /// Run `f` against the bitmap while holding the manager's read lock.
    ///
    /// Returns `None` if the bitmap is not initialized. `destroy_heap_bitmap`
    /// waits for running closures.
    pub fn with_heap_bitmap<R>(&self, f: impl FnOnce(&HeapBitmap) -> R) -> Option<R> {
        self.reservation.read().as_ref().map(|r| f(&r.bitmap))
    }
}

impl Default for HeapBitmapManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeapBitmapManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapBitmapManager")
            .field("start", &self.heap_bitmap_start())
            .field("size", &self.all_heap_bitmap_size())
            .finish()
    }
}

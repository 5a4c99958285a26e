//! Atomic bit-per-region mark bitmap over borrowed memory.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{bitmap_size_for, BITS_PER_WORD};
use crate::config::HeapBitmapConfig;

/// A mark bitmap covering `[heap_start, heap_end)`.
///
/// The words live in memory the bitmap does not own; see
/// [`HeapBitmapManager`](crate::HeapBitmapManager). Marking is lock-free
/// (one `fetch_or` per call) and may run from any number of threads.
/// `clear_all` must not race with marking.
pub struct HeapBitmap {
    words: NonNull<AtomicU64>,
    word_count: usize,
    heap_start: usize,
    heap_end: usize,
    unit_shift: u32,
}

// SAFETY: all access to the words goes through atomics.
unsafe impl Send for HeapBitmap {}
unsafe impl Sync for HeapBitmap {}

impl HeapBitmap {
    /// Describe `bytes` of zeroed memory at `base` as the bitmap for the
    /// heap range in `config`.
    ///
    /// # Safety
    ///
    /// `base..base + bytes` must be zero-initialized, readable, writable
    /// and stay valid for as long as the bitmap is used.
    ///
    /// # Panics
    ///
    /// Panics if `base` is not 8-byte aligned or `bytes` is too small to
    /// cover the configured heap.
    #[must_use]
    pub unsafe fn from_raw(base: NonNull<u8>, bytes: usize, config: &HeapBitmapConfig) -> Self {
        config.validate();
        assert_eq!(
            base.as_ptr() as usize % align_of::<AtomicU64>(),
            0,
            "heap bitmap memory must be word aligned"
        );
        let needed = bitmap_size_for(config.max_heap_capacity, config.region_unit);
        assert!(
            bytes >= needed,
            "heap bitmap of {bytes} bytes cannot cover {} heap bytes",
            config.max_heap_capacity
        );
        Self {
            words: base.cast(),
            word_count: needed / size_of::<u64>(),
            heap_start: config.heap_start,
            heap_end: config.heap_start + config.max_heap_capacity,
            unit_shift: config.region_unit.trailing_zeros(),
        }
    }

    /// Lowest covered heap address.
    #[must_use]
    pub const fn heap_start(&self) -> usize {
        self.heap_start
    }

    /// One past the highest covered heap address.
    #[must_use]
    pub const fn heap_end(&self) -> usize {
        self.heap_end
    }

    /// Heap bytes represented by one bit.
    #[must_use]
    pub const fn region_unit(&self) -> usize {
        1 << self.unit_shift
    }

    /// Number of 64-bit words in use.
    #[must_use]
    pub const fn word_count(&self) -> usize {
        self.word_count
    }

    /// Returns `true` if `addr` falls inside the covered heap range.
    #[inline]
    #[must_use]
    pub const fn covers(&self, addr: usize) -> bool {
        addr >= self.heap_start && addr < self.heap_end
    }

    /// Set the bit for `addr`. Returns the bit's previous value, so exactly
    /// one of several racing callers sees `false`.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is outside the covered range.
    #[inline]
    pub fn mark(&self, addr: usize) -> bool {
        let (word, mask) = self.locate(addr);
        word.fetch_or(mask, Ordering::AcqRel) & mask != 0
    }

    /// Returns `true` if the bit for `addr` is set.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is outside the covered range.
    #[inline]
    #[must_use]
    pub fn is_marked(&self, addr: usize) -> bool {
        let (word, mask) = self.locate(addr);
        word.load(Ordering::Acquire) & mask != 0
    }

    /// Clear the bit for `addr`. Returns the bit's previous value.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is outside the covered range.
    pub fn clear_mark(&self, addr: usize) -> bool {
        let (word, mask) = self.locate(addr);
        word.fetch_and(!mask, Ordering::AcqRel) & mask != 0
    }

    /// Clear every bit.
    pub fn clear_all(&self) {
        for i in 0..self.word_count {
            self.word(i).store(0, Ordering::Relaxed);
        }
    }

    /// Number of set bits. Linear in the bitmap size.
    #[must_use]
    pub fn count_marked(&self) -> usize {
        (0..self.word_count)
            .map(|i| self.word(i).load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    fn locate(&self, addr: usize) -> (&AtomicU64, u64) {
        assert!(
            self.covers(addr),
            "address {addr:#x} outside heap bitmap range [{:#x}, {:#x})",
            self.heap_start,
            self.heap_end
        );
        let bit = (addr - self.heap_start) >> self.unit_shift;
        let word = bit / BITS_PER_WORD;
        debug_assert!(word < self.word_count);
        (self.word(word), 1u64 << (bit % BITS_PER_WORD))
    }

    fn word(&self, index: usize) -> &AtomicU64 {
        // SAFETY: callers keep `index < word_count`, which lies inside the
        // memory promised to `from_raw`.
        unsafe { &*self.words.as_ptr().add(index) }
    }
}

impl fmt::Debug for HeapBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapBitmap")
            .field("words", &self.words)
            .field("word_count", &self.word_count)
            .field("heap_start", &format_args!("{:#x}", self.heap_start))
            .field("heap_end", &format_args!("{:#x}", self.heap_end))
            .field("region_unit", &self.region_unit())
            .finish()
    }
}

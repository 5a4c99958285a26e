//! Heap-wide mark bitmap backed by one large virtual memory reservation.
//!
//! One bit covers `region_unit` bytes of heap, packed into 64-bit words:
//!
//! ```text
//!   heap:    [ heap_start ........................... heap_start + capacity )
//!              │ region_unit bytes per bit
//!              ▼
//!   bitmap:  [ w0 | w1 | w2 | ... | wN ]   rounded up to the OS page size
//!   bit of addr = (addr - heap_start) / region_unit
//! ```

mod heap_bitmap;
mod manager;

pub use heap_bitmap::HeapBitmap;
pub use manager::HeapBitmapManager;

use crate::config::HeapBitmapConfig;

/// Bits held by one bitmap word.
pub const BITS_PER_WORD: usize = u64::BITS as usize;

/// Bytes of bitmap needed to cover `max_heap` bytes at one bit per
/// `region_unit` bytes, rounded up to whole words.
#[must_use]
pub const fn bitmap_size_for(max_heap: usize, region_unit: usize) -> usize {
    let bits = max_heap.div_ceil(region_unit);
    bits.div_ceil(BITS_PER_WORD) * size_of::<u64>()
}

/// Bytes reserved for the heap bitmap: [`bitmap_size_for`] rounded up to
/// the OS page size.
#[must_use]
pub fn heap_bitmap_reservation_size(config: &HeapBitmapConfig) -> usize {
    sys_alloc::align_up(
        bitmap_size_for(config.max_heap_capacity, config.region_unit),
        sys_alloc::page_size(),
    )
}

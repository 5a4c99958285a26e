//! Configuration for the SATB buffer and the heap bitmap.

/// Number of configured pages carved by the first `init`.
pub const DEFAULT_INITIAL_PAGES: usize = 64;

/// Heap capacity assumed when none is configured (1 GiB).
pub const DEFAULT_MAX_HEAP_CAPACITY: usize = 1 << 30;

/// Bytes of heap covered by one bitmap bit.
pub const DEFAULT_REGION_UNIT: usize = 8;

/// Sizing and behavior of a [`SatbBuffer`](crate::SatbBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatbConfig {
    /// Size in bytes of one arena page requested from the page pool.
    pub page_size: usize,
    /// Multiple of `page_size` allocated for the first arena page.
    pub initial_pages: usize,
    /// Whether the heap has a young generation. When set, young
    /// collections only record young-space objects.
    pub generational: bool,
}

impl Default for SatbConfig {
    fn default() -> Self {
        Self {
            page_size: sys_alloc::page_size(),
            initial_pages: DEFAULT_INITIAL_PAGES,
            generational: false,
        }
    }
}

impl SatbConfig {
    /// Checks that the configuration can be used to carve nodes.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` cannot hold a page header and one node, or if
    /// `initial_pages` is zero.
    pub fn validate(&self) {
        let min = crate::satb::arena::min_page_size();
        assert!(
            self.page_size >= min,
            "SATB page size {} is smaller than the minimum {min}",
            self.page_size
        );
        assert!(self.initial_pages > 0, "SATB initial page count must be non-zero");
    }
}

/// Sizing of the heap bitmap reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapBitmapConfig {
    /// Lowest heap address covered by the bitmap.
    pub heap_start: usize,
    /// Maximum number of heap bytes the bitmap must cover.
    pub max_heap_capacity: usize,
    /// Heap bytes represented by one bit.
    pub region_unit: usize,
}

impl Default for HeapBitmapConfig {
    fn default() -> Self {
        Self {
            heap_start: 0,
            max_heap_capacity: DEFAULT_MAX_HEAP_CAPACITY,
            region_unit: DEFAULT_REGION_UNIT,
        }
    }
}

impl HeapBitmapConfig {
    /// # Panics
    ///
    /// Panics if the heap capacity is zero or the region unit is not a
    /// non-zero power of two.
    pub fn validate(&self) {
        assert!(self.max_heap_capacity > 0, "heap capacity must be non-zero");
        assert!(
            self.region_unit.is_power_of_two(),
            "region unit {} must be a power of two",
            self.region_unit
        );
        assert!(
            self.heap_start.checked_add(self.max_heap_capacity).is_some(),
            "heap range overflows the address space"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satb_defaults() {
        let config = SatbConfig::default();
        assert_eq!(config.page_size, sys_alloc::page_size());
        assert_eq!(config.initial_pages, DEFAULT_INITIAL_PAGES);
        assert!(!config.generational);
        config.validate();
    }

    #[test]
    #[should_panic(expected = "smaller than the minimum")]
    fn test_satb_rejects_tiny_pages() {
        SatbConfig {
            page_size: 64,
            ..SatbConfig::default()
        }
        .validate();
    }

    #[test]
    #[should_panic(expected = "must be a power of two")]
    fn test_bitmap_rejects_odd_unit() {
        HeapBitmapConfig {
            region_unit: 24,
            ..HeapBitmapConfig::default()
        }
        .validate();
    }
}

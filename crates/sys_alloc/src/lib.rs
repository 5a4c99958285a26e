use std::ffi::CStr;
use std::io;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as os;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as os;

pub use os::page_size;

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
#[must_use]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// A handle to an anonymous memory mapping.
///
/// The region is unmapped when this handle is dropped. Use [`Mmap::unmap`]
/// to observe the OS result instead.
pub struct Mmap {
    inner: os::MmapInner,
}

impl Mmap {
    /// Returns a pointer to the start of the mapping.
    #[must_use]
    pub fn ptr(&self) -> *mut u8 {
        self.inner.ptr()
    }

    /// Returns the length of the mapping in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the mapping is zero sized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Asks the OS not to back this mapping with transparent huge pages.
    ///
    /// Only Linux and Android honour the request; elsewhere this is a no-op.
    pub fn advise_no_huge_pages(&self) -> io::Result<()> {
        self.inner.advise_no_huge_pages()
    }

    /// Tags the mapping with a name visible in OS diagnostics
    /// (`/proc/<pid>/maps` on Linux). No-op on platforms without named
    /// anonymous mappings.
    pub fn set_name(&self, name: &CStr) -> io::Result<()> {
        self.inner.set_name(name)
    }

    /// Unmaps the region and reports the OS result.
    pub fn unmap(self) -> io::Result<()> {
        let mut this = ManuallyDrop::new(self);
        this.inner.unmap()
    }

    /// Releases ownership of the mapping without unmapping it.
    ///
    /// The returned pointer and length must eventually be handed back to
    /// [`Mmap::from_raw`] to release the memory.
    #[must_use]
    pub fn into_raw(self) -> (NonNull<u8>, usize) {
        let this = ManuallyDrop::new(self);
        // SAFETY: a live mapping never starts at null.
        let ptr = unsafe { NonNull::new_unchecked(this.inner.ptr()) };
        (ptr, this.inner.len())
    }

    /// Reclaims a mapping previously released with [`Mmap::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must come from a single `into_raw` call and the
    /// mapping must not have been reclaimed already.
    #[must_use]
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            inner: unsafe { os::MmapInner::from_raw(ptr.as_ptr(), len) },
        }
    }
}

unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

/// Configuration for creating an anonymous mapping.
///
/// Mappings are always private, readable, writable and zero-filled.
#[derive(Debug, Clone)]
pub struct MmapOptions {
    len: usize,
    no_reserve: bool,
}

impl MmapOptions {
    /// Creates options with length 0. A length must be set before mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            len: 0,
            no_reserve: false,
        }
    }

    /// Sets the length of the mapping in bytes.
    #[must_use]
    pub const fn len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Skips reserving swap space for the mapping.
    ///
    /// On Linux this adds `MAP_NORESERVE`. Large sparse reservations such as
    /// heap bitmaps use it so untouched pages cost nothing.
    #[must_use]
    pub const fn no_reserve(mut self, no_reserve: bool) -> Self {
        self.no_reserve = no_reserve;
        self
    }

    /// Creates an anonymous, zero-filled, read-write mapping.
    pub fn map_anon(&self) -> io::Result<Mmap> {
        if self.len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "length must be greater than 0",
            ));
        }

        let inner = os::MmapInner::map_anon(self.len, self.no_reserve)?;
        Ok(Mmap { inner })
    }
}

impl Default for MmapOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_page_size() {
        let ps = page_size();
        assert!(ps > 0);
        assert_eq!(ps & (ps - 1), 0, "Page size should be power of 2");
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4096), 0);
        assert_eq!(align_up(1, 4096), 4096);
        assert_eq!(align_up(4096, 4096), 4096);
        assert_eq!(align_up(4097, 64), 4160);
    }

    #[test]
    fn test_zero_length_rejected() {
        let err = MmapOptions::new().map_anon().err().expect("zero length must fail");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_basic_map_is_zeroed() {
        let len = page_size() * 2;
        let mmap = MmapOptions::new().len(len).map_anon().expect("failed to map");

        let ptr = mmap.ptr();
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % page_size(), 0);
        assert_eq!(mmap.len(), len);

        unsafe {
            assert_eq!(ptr::read_volatile(ptr.add(len - 1)), 0);
            ptr::write_volatile(ptr, 42);
            assert_eq!(ptr::read_volatile(ptr), 42);
        }
    }

    #[test]
    fn test_advise_and_name_do_not_fail_mapping() {
        let mmap = MmapOptions::new()
            .len(page_size())
            .no_reserve(true)
            .map_anon()
            .expect("failed to map");
        // Kernels without THP or VMA naming reject these; the mapping stays usable.
        let _ = mmap.advise_no_huge_pages();
        let _ = mmap.set_name(c"sys_alloc_test");
        unsafe { ptr::write_volatile(mmap.ptr(), 7) };
        mmap.unmap().expect("unmap failed");
    }

    #[test]
    fn test_raw_round_trip() {
        let mmap = MmapOptions::new().len(page_size()).map_anon().expect("failed to map");
        let (ptr, len) = mmap.into_raw();
        unsafe {
            ptr::write_volatile(ptr.as_ptr(), 9);
            let mmap = Mmap::from_raw(ptr, len);
            assert_eq!(ptr::read_volatile(mmap.ptr()), 9);
            mmap.unmap().expect("unmap failed");
        }
    }
}

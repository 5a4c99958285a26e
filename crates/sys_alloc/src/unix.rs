use std::ffi::CStr;
use std::io::{self, Error};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_vendor = "apple",
    target_os = "netbsd",
    target_os = "solaris",
    target_os = "illumos",
))]
const MAP_NORESERVE: libc::c_int = libc::MAP_NORESERVE;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_vendor = "apple",
    target_os = "netbsd",
    target_os = "solaris",
    target_os = "illumos",
)))]
const MAP_NORESERVE: libc::c_int = 0;

// prctl(2) constants for naming anonymous mappings (Linux 5.17+).
#[cfg(any(target_os = "linux", target_os = "android"))]
const PR_SET_VMA: libc::c_int = 0x5356_4d41;
#[cfg(any(target_os = "linux", target_os = "android"))]
const PR_SET_VMA_ANON_NAME: libc::c_ulong = 0;

/// Returns the system page size, cached atomically.
pub fn page_size() -> usize {
    static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            #[allow(clippy::cast_sign_loss)]
            let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
            PAGE_SIZE.store(page_size, Ordering::Relaxed);
            page_size
        }
        page_size => page_size,
    }
}

pub struct MmapInner {
    ptr: *mut libc::c_void,
    len: usize,
}

impl MmapInner {
    pub fn map_anon(len: usize, no_reserve: bool) -> io::Result<Self> {
        let no_reserve = if no_reserve { MAP_NORESERVE } else { 0 };
        let flags = libc::MAP_PRIVATE | libc::MAP_ANON | no_reserve;
        let prot = libc::PROT_READ | libc::PROT_WRITE;

        // SAFETY: anonymous mapping with no address hint; the kernel picks the range.
        let ptr = unsafe { libc::mmap(ptr::null_mut(), len, prot, flags, -1, 0) };

        if ptr == libc::MAP_FAILED {
            return Err(Error::last_os_error());
        }

        Ok(Self { ptr, len })
    }

    pub const unsafe fn from_raw(ptr: *mut u8, len: usize) -> Self {
        Self {
            ptr: ptr.cast::<libc::c_void>(),
            len,
        }
    }

    pub fn ptr(&self) -> *mut u8 {
        self.ptr.cast::<u8>()
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn advise_no_huge_pages(&self) -> io::Result<()> {
        // SAFETY: the range is exactly the mapping we own.
        let ret = unsafe { libc::madvise(self.ptr, self.len, libc::MADV_NOHUGEPAGE) };
        if ret != 0 {
            return Err(Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    pub fn advise_no_huge_pages(&self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn set_name(&self, name: &CStr) -> io::Result<()> {
        // SAFETY: the kernel copies `name` before returning.
        let ret = unsafe {
            libc::prctl(
                PR_SET_VMA,
                PR_SET_VMA_ANON_NAME,
                self.ptr as libc::c_ulong,
                self.len as libc::c_ulong,
                name.as_ptr(),
            )
        };
        if ret != 0 {
            return Err(Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    pub fn set_name(&self, _name: &CStr) -> io::Result<()> {
        Ok(())
    }

    pub fn unmap(&mut self) -> io::Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        // SAFETY: we own the mapping and forget it on success or failure.
        let ret = unsafe { libc::munmap(self.ptr, self.len) };
        self.len = 0;
        if ret != 0 {
            return Err(Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for MmapInner {
    fn drop(&mut self) {
        let _ = self.unmap();
    }
}

unsafe impl Send for MmapInner {}
unsafe impl Sync for MmapInner {}

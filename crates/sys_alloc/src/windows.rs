use std::ffi::CStr;
use std::io::{self, Error};
use std::mem;
use std::ptr;

use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

pub fn page_size() -> usize {
    // SAFETY: GetSystemInfo only writes into the provided struct.
    unsafe {
        let mut info: SYSTEM_INFO = mem::zeroed();
        GetSystemInfo(&mut info);
        let size = info.dwPageSize as usize;
        if size == 0 {
            4096
        } else {
            size
        }
    }
}

pub struct MmapInner {
    ptr: *mut std::ffi::c_void,
    len: usize,
}

impl MmapInner {
    /// `no_reserve` has no Windows equivalent once memory is committed.
    pub fn map_anon(len: usize, _no_reserve: bool) -> io::Result<Self> {
        // SAFETY: fresh reservation; VirtualAlloc zero-fills committed pages.
        let ptr = unsafe { VirtualAlloc(ptr::null(), len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };

        if ptr.is_null() {
            return Err(Error::last_os_error());
        }

        Ok(Self { ptr, len })
    }

    pub const unsafe fn from_raw(ptr: *mut u8, len: usize) -> Self {
        Self {
            ptr: ptr.cast::<std::ffi::c_void>(),
            len,
        }
    }

    pub const fn ptr(&self) -> *mut u8 {
        self.ptr.cast::<u8>()
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    pub fn advise_no_huge_pages(&self) -> io::Result<()> {
        Ok(())
    }

    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    pub fn set_name(&self, _name: &CStr) -> io::Result<()> {
        Ok(())
    }

    pub fn unmap(&mut self) -> io::Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        // MEM_RELEASE requires dwSize to be 0
        // SAFETY: we own the reservation.
        let ok = unsafe { VirtualFree(self.ptr, 0, MEM_RELEASE) };
        self.len = 0;
        if ok == 0 {
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

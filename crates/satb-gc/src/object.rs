//! Opaque references to heap objects.

use std::fmt;
use std::ptr::NonNull;

/// Marker type for the start of a managed object.
///
/// The buffer never dereferences objects; it only stores and hands back
/// their addresses.
#[repr(C)]
pub struct BaseObject {
    _private: [u8; 0],
}

/// A non-null reference to a heap object, as recorded by the write barrier.
///
/// `Option<ObjectRef>` has the size of a pointer and is what buffer nodes
/// store, so an unused slot is simply `None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(NonNull<BaseObject>);

impl ObjectRef {
    /// Wraps a raw object pointer, returning `None` for null.
    #[must_use]
    pub fn new(ptr: *mut BaseObject) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Builds a reference from an address, returning `None` for zero.
    #[must_use]
    pub fn from_addr(addr: usize) -> Option<Self> {
        Self::new(addr as *mut BaseObject)
    }

    /// Returns the raw object pointer.
    #[must_use]
    pub const fn as_ptr(self) -> *mut BaseObject {
        self.0.as_ptr()
    }

    /// Returns the object's address.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x})", self.addr())
    }
}

// SAFETY: an ObjectRef is only an address; the buffer never reads through it.
unsafe impl Send for ObjectRef {}
unsafe impl Sync for ObjectRef {}

#[cfg(test)]
mod tests {
    use super::ObjectRef;

    #[test]
    fn test_null_is_none() {
        assert!(ObjectRef::from_addr(0).is_none());
        assert!(ObjectRef::new(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn test_option_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<Option<ObjectRef>>(),
            std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_addr_round_trip() {
        let obj = ObjectRef::from_addr(0x1000).unwrap();
        assert_eq!(obj.addr(), 0x1000);
        assert_eq!(format!("{obj:?}"), "ObjectRef(0x1000)");
    }
}

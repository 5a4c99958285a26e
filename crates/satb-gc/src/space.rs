//! Collaborator interfaces consumed by the write barrier.
//!
//! The SATB buffer does not know how objects are laid out or marked. It asks
//! the heap's region space a handful of questions through [`RegionSpace`],
//! and asks the heap why the current collection was started through
//! [`GcHeap`].

use crate::object::ObjectRef;

/// Why the current collection cycle was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GcReason {
    /// Explicit request from user code.
    User,
    /// Allocation failed and the heap is out of memory.
    Oom,
    /// Periodic backup collection.
    Backup,
    /// Triggered by heap growth heuristics.
    #[default]
    Heuristic,
    /// Young-generation-only collection.
    Young,
    /// Native memory pressure.
    Native,
    /// Forced full collection (testing, shutdown).
    Force,
}

impl GcReason {
    /// Returns `true` for young-generation collections.
    #[must_use]
    pub const fn is_young(self) -> bool {
        matches!(self, Self::Young)
    }
}

/// Object predicates provided by the region space allocator.
///
/// Every method must be callable concurrently from any mutator thread.
pub trait RegionSpace: Send + Sync {
    /// Returns `true` if `obj` was allocated after the current trace began.
    fn is_new_object_since_trace(&self, obj: ObjectRef) -> bool;

    /// Returns `true` if `obj` is already marked by the collector.
    fn is_marked_object(&self, obj: ObjectRef) -> bool;

    /// Atomically sets the object's enqueue bit and returns its previous
    /// value.
    ///
    /// `false` means the bit was clear and the caller is now responsible
    /// for recording the object; `true` means someone else already claimed
    /// it.
    fn enqueue_object(&self, obj: ObjectRef) -> bool;

    /// Returns `true` if `obj` lives in the young generation.
    ///
    /// Only consulted by generational builds.
    fn is_young_space_object(&self, _obj: ObjectRef) -> bool {
        false
    }
}

/// The heap as seen by the write barrier.
pub trait GcHeap: Send + Sync {
    /// Reason for the collection currently in progress.
    fn gc_reason(&self) -> GcReason;

    /// The region space owning every object handed to the barrier.
    fn region_space(&self) -> &dyn RegionSpace;
}

#[cfg(test)]
mod tests {
    use super::GcReason;

    #[test]
    fn test_only_young_is_young() {
        assert!(GcReason::Young.is_young());
        for reason in [
            GcReason::User,
            GcReason::Oom,
            GcReason::Backup,
            GcReason::Heuristic,
            GcReason::Native,
            GcReason::Force,
        ] {
            assert!(!reason.is_young(), "{reason:?}");
        }
    }

    #[test]
    fn test_default_reason() {
        assert_eq!(GcReason::default(), GcReason::Heuristic);
    }
}
